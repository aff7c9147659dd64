use crate::error::Result;
use crate::models::{GridDataset, StationTable, TimeSeries};
use crate::utils::constants::{COMBINED_PREFIX, FILLED_PREFIX};
use crate::utils::series_to_celsius;

/// Merges reconstructed temperatures into the gaps of a station's sensor column
pub struct GapFiller {
    sensor: String,
}

impl GapFiller {
    pub fn new(sensor: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
        }
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn filled_column(&self) -> String {
        format!("{}{}", FILLED_PREFIX, self.sensor)
    }

    pub fn combined_column(&self) -> String {
        format!("{}{}", COMBINED_PREFIX, self.sensor)
    }

    /// Reduce a reconstruction to one Celsius value per timestamp.
    ///
    /// The ensemble median is taken when members are present, then the plain
    /// mean over the whole spatial grid, and finally Kelvin to Celsius.
    pub fn predicted_series(&self, grid: &GridDataset) -> TimeSeries {
        let series = series_to_celsius(grid.spatial_mean(), grid.units());
        tracing::debug!(
            steps = series.len(),
            members = grid.member_count(),
            "reduced reconstruction to station series"
        );
        series.rename(self.filled_column())
    }

    /// Copy `original` and add the `filled_` and `combined_` columns.
    ///
    /// Predictions land only on rows whose timestamp they share; observed
    /// values always win in the combined column.
    pub fn merge(&self, original: &StationTable, predicted: &TimeSeries) -> Result<StationTable> {
        let filled = self.filled_column();
        let combined = self.combined_column();

        let mut table = original.clone();
        table.insert_column(filled.clone(), vec![None; table.len()])?;
        let written = table.update_column(&filled, predicted)?;

        let merged = table.combine_first(&self.sensor, &filled)?;
        let gaps_filled = table
            .column(&self.sensor)
            .map(|observed| {
                observed
                    .iter()
                    .zip(&merged)
                    .filter(|(o, m)| o.is_none() && m.is_some())
                    .count()
            })
            .unwrap_or_default();
        table.insert_column(combined, merged)?;

        tracing::info!(
            sensor = %self.sensor,
            rows = table.len(),
            predictions = written,
            gaps_filled,
            "merged predictions into station table"
        );

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use ndarray::Array3;
    use pretty_assertions::assert_eq;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn original() -> StationTable {
        StationTable::new(vec![hour(0), hour(1), hour(2), hour(3)])
            .with_column("AirTC", vec![Some(10.0), None, Some(12.0), None])
            .unwrap()
            .with_column("RH", vec![Some(60.0), Some(61.0), None, Some(63.0)])
            .unwrap()
    }

    #[test]
    fn test_column_names() {
        let filler = GapFiller::new("AirTC");
        assert_eq!(filler.filled_column(), "filled_AirTC");
        assert_eq!(filler.combined_column(), "combined_AirTC");
    }

    #[test]
    fn test_predicted_series_is_celsius_spatial_mean() {
        let values = Array3::from_shape_vec(
            (2, 2, 2),
            vec![283.15, 285.15, 283.15, 285.15, 290.0, 290.0, 290.0, 290.0],
        )
        .unwrap();
        let grid = GridDataset::new("tas", vec![hour(1), hour(0)], vec![49.0, 49.25], vec![8.0, 8.25], values)
            .unwrap();

        let series = GapFiller::new("AirTC").predicted_series(&grid);

        assert_eq!(series.name(), "filled_AirTC");
        assert_eq!(series.timestamps(), &[hour(0), hour(1)]);
        assert!((series.value_at(hour(1)).unwrap() - 11.0).abs() < 1e-9);
        assert!((series.value_at(hour(0)).unwrap() - 16.85).abs() < 1e-9);
    }

    #[test]
    fn test_predicted_series_averages_before_converting() {
        let values = Array3::from_shape_vec((1, 2, 2), vec![300.0, 302.0, 301.0, 303.0]).unwrap();
        let grid = GridDataset::new("tas", vec![hour(0)], vec![49.0, 49.25], vec![8.0, 8.25], values)
            .unwrap();
        let filler = GapFiller::new("AirTC");

        let plain = filler.predicted_series(&grid);
        assert!((plain.value_at(hour(0)).unwrap() - 28.35).abs() < 1e-9);

        // Units metadata does not change the conversion
        let labelled = filler.predicted_series(&grid.with_units("degC"));
        assert_eq!(labelled.values(), plain.values());
    }

    #[test]
    fn test_merge_keeps_observations() {
        let filler = GapFiller::new("AirTC");
        let predicted = TimeSeries::from_parts(
            "filled_AirTC",
            vec![hour(0), hour(1), hour(2), hour(7)],
            vec![9.5, 11.0, 11.5, 30.0],
        );

        let merged = filler.merge(&original(), &predicted).unwrap();

        assert_eq!(merged.column_names(), vec!["AirTC", "RH", "filled_AirTC", "combined_AirTC"]);
        assert_eq!(
            merged.column("filled_AirTC").unwrap(),
            &[Some(9.5), Some(11.0), Some(11.5), None]
        );
        assert_eq!(
            merged.column("combined_AirTC").unwrap(),
            &[Some(10.0), Some(11.0), Some(12.0), None]
        );
        // Source table untouched
        assert_eq!(original().columns().len(), 2);
    }

    #[test]
    fn test_merge_without_overlap_leaves_filled_empty() {
        let filler = GapFiller::new("AirTC");
        let predicted = TimeSeries::from_parts("filled_AirTC", vec![hour(9)], vec![1.0]);

        let merged = filler.merge(&original(), &predicted).unwrap();

        assert_eq!(merged.column("filled_AirTC").unwrap(), &[None, None, None, None]);
        assert_eq!(merged.column("combined_AirTC"), merged.column("AirTC"));
    }

    #[test]
    fn test_merge_unknown_sensor() {
        let filler = GapFiller::new("T107");
        let predicted = TimeSeries::from_parts("filled_T107", vec![hour(0)], vec![1.0]);
        assert!(filler.merge(&original(), &predicted).is_err());
    }
}
