use crate::error::{PipelineError, Result};
use crate::models::{ComparisonRow, ComparisonTable, GridDataset, StationLocation, TimeSeries};
use crate::utils::series_to_celsius;

/// Aligns reconstructed, reference and measured temperatures for one station
pub struct ComparisonBuilder<'a> {
    location: &'a StationLocation,
}

impl<'a> ComparisonBuilder<'a> {
    pub fn new(location: &'a StationLocation) -> Self {
        Self { location }
    }

    /// Ensemble median of the reconstruction averaged over the grid, in °C
    pub fn reconstructed_series(&self, reconstructed: &GridDataset) -> TimeSeries {
        series_to_celsius(reconstructed.spatial_mean(), reconstructed.units())
    }

    /// Reference grid cell nearest to the station, in °C
    pub fn reference_series(&self, reference: &GridDataset) -> Result<TimeSeries> {
        let (lat, lon) = reference.nearest_cell(self.location.latitude, self.location.longitude)?;
        tracing::debug!(
            grid_lat = reference.lats()[lat],
            grid_lon = reference.lons()[lon],
            "nearest reference cell"
        );
        let series = reference.nearest_series(self.location.latitude, self.location.longitude)?;
        Ok(series_to_celsius(series, reference.units()))
    }

    /// One row per reconstructed timestamp.
    ///
    /// Reference and measured values are looked up at the same timestamp and
    /// left missing where absent.
    pub fn build(
        &self,
        reconstructed: &GridDataset,
        reference: &GridDataset,
        measured: &TimeSeries,
    ) -> Result<ComparisonTable> {
        let reconstructed = self.reconstructed_series(reconstructed);
        let reference = self.reference_series(reference)?;

        if reconstructed.is_empty() {
            return Err(PipelineError::MissingData(
                "Reconstruction has no time steps".to_string(),
            ));
        }

        let rows: Vec<_> = reconstructed
            .iter()
            .map(|(ts, value)| {
                ComparisonRow::new(
                    ts,
                    Some(value).filter(|v| !v.is_nan()),
                    reference.value_at(ts),
                    measured.value_at(ts),
                )
            })
            .collect();

        let matched = rows.iter().filter(|r| r.measured.is_some()).count();
        if matched == 0 {
            tracing::warn!(
                station = %self.location.name,
                "no measurements overlap the reconstruction period"
            );
        }
        tracing::info!(
            station = %self.location.name,
            rows = rows.len(),
            with_measurements = matched,
            "built comparison table"
        );

        Ok(ComparisonTable::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use ndarray::Array3;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn location() -> StationLocation {
        StationLocation {
            name: "Karlsruhe".to_string(),
            latitude: 49.01,
            longitude: 8.41,
        }
    }

    #[test]
    fn test_build_aligns_on_reconstructed_axis() {
        let reconstructed = GridDataset::new(
            "tas",
            vec![hour(0), hour(1), hour(2)],
            vec![49.0],
            vec![8.4],
            Array3::from_shape_vec((3, 1, 1), vec![290.15, 291.15, f64::NAN]).unwrap(),
        )
        .unwrap();

        // 0..360 longitudes, nearest cell is (49.0, 8.5)
        let reference = GridDataset::new(
            "tas",
            vec![hour(1), hour(2)],
            vec![49.0, 50.0],
            vec![8.5, 350.0],
            Array3::from_shape_vec(
                (2, 2, 2),
                vec![
                    293.15, 0.0, 0.0, 0.0, //
                    294.15, 0.0, 0.0, 0.0,
                ],
            )
            .unwrap(),
        )
        .unwrap()
        .with_units("K");

        let measured = TimeSeries::from_parts("AirTC", vec![hour(0), hour(2), hour(5)], vec![16.5, 18.0, 1.0]);

        let location = location();
        let table = ComparisonBuilder::new(&location)
            .build(&reconstructed, &reference, &measured)
            .unwrap();

        assert_eq!(table.len(), 3);
        let rows = table.rows();
        assert!((rows[0].reconstructed.unwrap() - 17.0).abs() < 1e-9);
        assert_eq!(rows[0].reference, None);
        assert_eq!(rows[0].measured, Some(16.5));

        assert!((rows[1].reference.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(rows[1].measured, None);

        assert_eq!(rows[2].reconstructed, None);
        assert!((rows[2].reference.unwrap() - 21.0).abs() < 1e-9);
        assert_eq!(rows[2].measured, Some(18.0));
    }

    #[test]
    fn test_reference_is_converted_whatever_its_units() {
        let reference = GridDataset::new(
            "t2m",
            vec![hour(0)],
            vec![49.0],
            vec![8.4],
            Array3::from_elem((1, 1, 1), 291.15),
        )
        .unwrap()
        .with_units("degC");

        let location = location();
        let series = ComparisonBuilder::new(&location).reference_series(&reference).unwrap();
        assert!((series.values()[0] - 18.0).abs() < 1e-9);
    }
}
