//! CF-convention time axis decoding.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, Result};

/// Parsed `"<unit> since <reference>"` attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub reference: NaiveDateTime,
}

impl TimeUnits {
    /// Parse units such as `"hours since 1900-01-01 00:00:00.0"`
    pub fn parse(units: &str) -> Result<Self> {
        let mut parts = units.trim().splitn(3, ' ');
        let unit = parts.next().unwrap_or_default();
        let since = parts.next().unwrap_or_default();
        let reference = parts.next().unwrap_or_default().trim();

        if since != "since" || reference.is_empty() {
            return Err(PipelineError::InvalidFormat(format!(
                "Unexpected time units: '{}'",
                units
            )));
        }

        let seconds_per_unit = match unit.to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "h" => 3600.0,
            "days" | "day" | "d" => 86_400.0,
            other => {
                return Err(PipelineError::InvalidFormat(format!(
                    "Unsupported time unit: '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            seconds_per_unit,
            reference: parse_reference(reference)?,
        })
    }

    /// Convert raw offsets to timestamps, rounded to the nearest second
    pub fn decode(&self, offsets: &[f64]) -> Vec<NaiveDateTime> {
        offsets
            .iter()
            .map(|offset| {
                let seconds = (offset * self.seconds_per_unit).round() as i64;
                self.reference + Duration::seconds(seconds)
            })
            .collect()
    }
}

fn parse_reference(reference: &str) -> Result<NaiveDateTime> {
    let cleaned = reference.trim_end_matches('Z').replace('T', " ");
    let cleaned = cleaned.trim();

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Ok(parsed);
        }
    }

    let date_part = cleaned.split(' ').next().unwrap_or(cleaned);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        PipelineError::InvalidFormat(format!("Invalid reference time: '{}'", reference))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era5_units() {
        let units = TimeUnits::parse("hours since 1900-01-01 00:00:00.0").unwrap();
        assert_eq!(units.seconds_per_unit, 3600.0);

        let times = units.decode(&[1_078_200.0]);
        assert_eq!(times[0].to_string(), "2023-01-01 00:00:00");
    }

    #[test]
    fn test_date_only_reference() {
        let units = TimeUnits::parse("days since 2000-01-01").unwrap();
        let times = units.decode(&[0.0, 1.5]);
        assert_eq!(times[1].to_string(), "2000-01-02 12:00:00");
    }

    #[test]
    fn test_iso_reference() {
        let units = TimeUnits::parse("seconds since 1970-01-01T00:00:00Z").unwrap();
        let times = units.decode(&[86_400.0]);
        assert_eq!(times[0].to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_invalid_units() {
        assert!(TimeUnits::parse("hours after 1900-01-01").is_err());
        assert!(TimeUnits::parse("fortnights since 1900-01-01").is_err());
    }
}
