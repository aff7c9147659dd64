//! Dataset reader backed by the system netCDF library.

use std::path::Path;

use ndarray::{ArrayD, Axis, Ix4, IxDyn};
use netcdf::AttributeValue;

use crate::error::{PipelineError, Result};
use crate::models::GridDataset;
use crate::readers::cf_time::TimeUnits;
use crate::readers::DatasetReader;

const TIME_ALIASES: &[&str] = &["time", "valid_time", "t"];
const LAT_ALIASES: &[&str] = &["lat", "latitude", "y"];
const LON_ALIASES: &[&str] = &["lon", "longitude", "x"];

pub struct NetcdfReader;

impl NetcdfReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NetcdfReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetReader for NetcdfReader {
    fn read_variable(&self, path: &Path, variable: &str) -> Result<GridDataset> {
        if !path.exists() {
            return Err(PipelineError::missing_input(path, "Dataset file"));
        }

        let file = netcdf::open(path)?;
        let var = file.variable(variable).ok_or_else(|| {
            PipelineError::MissingData(format!(
                "Variable '{}' not found in {}",
                variable,
                path.display()
            ))
        })?;

        let dim_names: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let raw: Vec<f64> = var.get_values::<f64, _>(..)?;
        let fill_value = f64_attribute(&var, "_FillValue").or_else(|| f64_attribute(&var, "missing_value"));
        let scale = f64_attribute(&var, "scale_factor").unwrap_or(1.0);
        let offset = f64_attribute(&var, "add_offset").unwrap_or(0.0);

        let data: Vec<f64> = raw
            .into_iter()
            .map(|v| match fill_value {
                Some(fill) if v == fill => f64::NAN,
                _ => v * scale + offset,
            })
            .collect();

        let array = ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| PipelineError::InvalidFormat(format!("Variable '{}': {}", variable, e)))?;
        let values = to_time_member_lat_lon(array, &dim_names, variable)?;

        let times = read_times(&file, path)?;
        let lats = read_coordinate(&file, LAT_ALIASES, path)?;
        let lons = read_coordinate(&file, LON_ALIASES, path)?;

        let dataset = GridDataset::with_members(variable, times, lats, lons, values)?;
        Ok(match string_attribute(&var, "units") {
            Some(units) => dataset.with_units(units),
            None => dataset,
        })
    }
}

/// Reorder a 3-D or 4-D variable to `time × member × lat × lon`
fn to_time_member_lat_lon(
    array: ArrayD<f64>,
    dim_names: &[String],
    variable: &str,
) -> Result<ndarray::Array4<f64>> {
    let position = |aliases: &[&str]| {
        dim_names
            .iter()
            .position(|name| aliases.contains(&name.as_str()))
    };

    let (time, lat, lon) = match (position(TIME_ALIASES), position(LAT_ALIASES), position(LON_ALIASES)) {
        (Some(t), Some(y), Some(x)) => (t, y, x),
        _ => {
            return Err(PipelineError::InvalidFormat(format!(
                "Variable '{}' must have time, lat and lon dimensions, found {:?}",
                variable, dim_names
            )))
        }
    };

    let array = match dim_names.len() {
        3 => array.insert_axis(Axis(3)),
        4 => array,
        n => {
            return Err(PipelineError::InvalidFormat(format!(
                "Variable '{}' has {} dimensions, expected 3 or 4",
                variable, n
            )))
        }
    };

    let member = (0..4)
        .find(|axis| ![time, lat, lon].contains(axis))
        .unwrap_or(3);

    array
        .permuted_axes(IxDyn(&[time, member, lat, lon]))
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix4>()
        .map_err(|e| PipelineError::InvalidFormat(format!("Variable '{}': {}", variable, e)))
}

fn read_times(file: &netcdf::File, path: &Path) -> Result<Vec<chrono::NaiveDateTime>> {
    let var = TIME_ALIASES
        .iter()
        .find_map(|alias| file.variable(alias))
        .ok_or_else(|| {
            PipelineError::MissingData(format!("No time variable in {}", path.display()))
        })?;

    let units = string_attribute(&var, "units").ok_or_else(|| {
        PipelineError::InvalidFormat(format!("Time variable in {} has no units", path.display()))
    })?;
    let offsets: Vec<f64> = var.get_values::<f64, _>(..)?;

    Ok(TimeUnits::parse(&units)?.decode(&offsets))
}

fn read_coordinate(file: &netcdf::File, aliases: &[&str], path: &Path) -> Result<Vec<f64>> {
    for &alias in aliases {
        if let Some(var) = file.variable(alias) {
            return Ok(var.get_values::<f64, _>(..)?);
        }
    }
    Err(PipelineError::MissingData(format!(
        "No '{}' coordinate in {}",
        aliases.first().copied().unwrap_or("unknown"),
        path.display()
    )))
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn f64_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn string_attribute(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
