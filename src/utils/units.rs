use crate::models::TimeSeries;
use crate::utils::constants::KELVIN_OFFSET;

pub fn to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Convert a Kelvin series to Celsius.
///
/// The offset is always applied. A units attribute naming Celsius is only
/// reported.
pub fn series_to_celsius(series: TimeSeries, units: Option<&str>) -> TimeSeries {
    if is_celsius(units) {
        tracing::warn!(
            series = %series.name(),
            units = units.unwrap_or_default(),
            "units attribute says Celsius, converting from Kelvin regardless"
        );
    }
    series.map_values(to_celsius)
}

/// Whether a units attribute denotes Celsius
pub fn is_celsius(units: Option<&str>) -> bool {
    match units {
        Some(units) => {
            let units = units.trim().to_lowercase();
            matches!(
                units.as_str(),
                "c" | "degc" | "deg c" | "degree_celsius" | "degrees_celsius" | "celsius" | "\u{b0}c"
            )
        }
        None => false,
    }
}
