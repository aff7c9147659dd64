use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::models::{StationTable, TimeSeries};

/// Translates between a station's native on-disk files and [`StationTable`]
pub trait StationConverter {
    /// Column holding the air temperature sensor
    fn sensor_name(&self) -> &str;

    /// Observations as read from the native file
    fn original_table(&self) -> &StationTable;

    /// Shape a standard table into the native schema
    fn to_native(&self, table: &StationTable) -> Result<StationTable>;

    /// Write a native-schema table to disk
    fn export_native(&self, table: &StationTable, path: &Path) -> Result<()>;

    /// File extension of the native format, without the dot
    fn native_extension(&self) -> &str;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 360.0))]
    pub longitude: Option<f64>,

    pub elevation: Option<f64>,

    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl StationMetadata {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }
}

/// Validated name and coordinates of a station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub struct Station {
    pub name: Option<String>,
    pub metadata: StationMetadata,
    converter: Box<dyn StationConverter>,
}

impl Station {
    pub fn new(
        name: Option<String>,
        metadata: StationMetadata,
        converter: Box<dyn StationConverter>,
    ) -> Self {
        Self {
            name,
            metadata,
            converter,
        }
    }

    pub fn converter(&self) -> &dyn StationConverter {
        self.converter.as_ref()
    }

    /// Name and coordinates, failing when any of them is missing or out of range
    pub fn location(&self) -> Result<StationLocation> {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| PipelineError::Configuration("Station has no name".to_string()))?;

        self.metadata.validate()?;

        let latitude = self.metadata.latitude.ok_or_else(|| {
            PipelineError::Configuration(format!("Station '{}' has no latitude", name))
        })?;
        let longitude = self.metadata.longitude.ok_or_else(|| {
            PipelineError::Configuration(format!("Station '{}' has no longitude", name))
        })?;

        Ok(StationLocation {
            name: name.to_string(),
            latitude,
            longitude,
        })
    }

    /// First and last observation timestamps
    pub fn time_window(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let table = self.converter.original_table();
        let first = table.index().iter().min().copied();
        let last = table.index().iter().max().copied();

        match (first, last) {
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Err(PipelineError::MissingData(
                "Station has no observations".to_string(),
            )),
        }
    }

    /// Air temperature observations
    pub fn measurements(&self) -> Result<TimeSeries> {
        let sensor = self.converter.sensor_name();
        self.converter.original_table().series(sensor)
    }
}

impl fmt::Debug for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("sensor", &self.converter.sensor_name())
            .field("rows", &self.converter.original_table().len())
            .finish()
    }
}
