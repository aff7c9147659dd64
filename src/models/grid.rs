use chrono::NaiveDateTime;
use ndarray::{s, Array3, Array4, Axis};

use crate::error::{PipelineError, Result};
use crate::models::TimeSeries;
use crate::utils::coordinates::{align_longitude, nearest_index};

/// One gridded variable laid out as `time × member × lat × lon`.
///
/// Datasets without an ensemble dimension have a single member.
#[derive(Debug, Clone)]
pub struct GridDataset {
    variable: String,
    units: Option<String>,
    times: Vec<NaiveDateTime>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    values: Array4<f64>,
}

impl GridDataset {
    /// Build a dataset from a `time × lat × lon` array
    pub fn new(
        variable: impl Into<String>,
        times: Vec<NaiveDateTime>,
        lats: Vec<f64>,
        lons: Vec<f64>,
        values: Array3<f64>,
    ) -> Result<Self> {
        let values = values.insert_axis(Axis(1));
        Self::with_members(variable, times, lats, lons, values)
    }

    /// Build a dataset from a `time × member × lat × lon` array
    pub fn with_members(
        variable: impl Into<String>,
        times: Vec<NaiveDateTime>,
        lats: Vec<f64>,
        lons: Vec<f64>,
        values: Array4<f64>,
    ) -> Result<Self> {
        let variable = variable.into();
        let (nt, nm, ny, nx) = values.dim();

        if nt != times.len() || ny != lats.len() || nx != lons.len() {
            return Err(PipelineError::InvalidFormat(format!(
                "Variable '{}' has shape {:?} but coordinates are time={}, lat={}, lon={}",
                variable,
                values.shape(),
                times.len(),
                lats.len(),
                lons.len()
            )));
        }

        if nm == 0 {
            return Err(PipelineError::InvalidFormat(format!(
                "Variable '{}' has an empty member dimension",
                variable
            )));
        }

        Ok(Self {
            variable,
            units: None,
            times,
            lats,
            lons,
            values,
        })
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn member_count(&self) -> usize {
        self.values.dim().1
    }

    /// Median across members, skipping NaN. A cell with no finite member is NaN.
    pub fn ensemble_median(&self) -> Array3<f64> {
        if self.member_count() == 1 {
            return self.values.index_axis(Axis(1), 0).to_owned();
        }

        let (nt, _, ny, nx) = self.values.dim();
        let mut out = Array3::<f64>::from_elem((nt, ny, nx), f64::NAN);
        for t in 0..nt {
            for y in 0..ny {
                for x in 0..nx {
                    let members: Vec<f64> = self
                        .values
                        .slice(s![t, .., y, x])
                        .iter()
                        .copied()
                        .filter(|v| !v.is_nan())
                        .collect();
                    out[[t, y, x]] = median(members);
                }
            }
        }
        out
    }

    /// Arithmetic mean over both spatial axes of the ensemble median, one
    /// value per timestamp. NaN propagates like a plain mean.
    pub fn spatial_mean(&self) -> TimeSeries {
        let reduced = self.ensemble_median();
        let cells = (self.lats.len() * self.lons.len()) as f64;

        let values = reduced
            .outer_iter()
            .map(|frame| {
                if cells == 0.0 {
                    f64::NAN
                } else {
                    frame.sum() / cells
                }
            })
            .collect();

        TimeSeries::from_parts(self.variable.clone(), self.times.clone(), values)
    }

    /// Grid indices `(lat, lon)` of the cell nearest to a location
    pub fn nearest_cell(&self, latitude: f64, longitude: f64) -> Result<(usize, usize)> {
        let longitude = align_longitude(longitude, &self.lons);
        let lat = nearest_index(&self.lats, latitude);
        let lon = nearest_index(&self.lons, longitude);

        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok((lat, lon)),
            _ => Err(PipelineError::MissingData(format!(
                "Variable '{}' has no finite grid coordinates",
                self.variable
            ))),
        }
    }

    /// Series at the grid cell nearest to a location (ensemble median)
    pub fn nearest_series(&self, latitude: f64, longitude: f64) -> Result<TimeSeries> {
        let (lat, lon) = self.nearest_cell(latitude, longitude)?;
        let reduced = self.ensemble_median();
        let values = reduced.slice(s![.., lat, lon]).to_vec();

        Ok(TimeSeries::from_parts(
            self.variable.clone(),
            self.times.clone(),
            values,
        ))
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
