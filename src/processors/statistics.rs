use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::models::{AxisKey, ComparisonTable};

/// Error of one estimate against the station measurements
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ErrorMetrics {
    /// Rows where both the estimate and the measurement are present
    pub count: usize,
    pub bias: Option<f64>,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
}

impl ErrorMetrics {
    fn from_deltas(deltas: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;

        for delta in deltas.filter(|d| d.is_finite()) {
            count += 1;
            sum += delta;
            abs_sum += delta.abs();
            sq_sum += delta * delta;
        }

        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        Self {
            count,
            bias: Some(sum / n),
            mae: Some(abs_sum / n),
            rmse: Some((sq_sum / n).sqrt()),
        }
    }

    fn describe(&self) -> String {
        match (self.bias, self.mae, self.rmse) {
            (Some(bias), Some(mae), Some(rmse)) => format!(
                "bias {:+.2}°C, MAE {:.2}°C, RMSE {:.2}°C over {} rows",
                bias, mae, rmse, self.count
            ),
            _ => "no overlapping measurements".to_string(),
        }
    }
}

/// Summary of how well the reconstruction and the reference match the station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonStatistics {
    pub station: String,
    pub rows: usize,
    pub measured_rows: usize,
    pub reconstructed: ErrorMetrics,
    pub reference: ErrorMetrics,
}

impl ComparisonStatistics {
    pub fn from_table<K: AxisKey>(station: &str, table: &ComparisonTable<K>) -> Self {
        let rows = table.rows();
        Self {
            station: station.to_string(),
            rows: rows.len(),
            measured_rows: rows.iter().filter(|r| r.measured.is_some()).count(),
            reconstructed: ErrorMetrics::from_deltas(rows.iter().filter_map(|r| r.reconstructed_delta())),
            reference: ErrorMetrics::from_deltas(rows.iter().filter_map(|r| r.reference_delta())),
        }
    }

    /// Whether the reconstruction beats the reference on RMSE
    pub fn reconstruction_improves(&self) -> Option<bool> {
        Some(self.reconstructed.rmse? < self.reference.rmse?)
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str(&format!("=== Validation Summary: {} ===\n", self.station));
        summary.push_str(&format!(
            "Rows: {} ({} with measurements)\n",
            self.rows, self.measured_rows
        ));
        summary.push_str(&format!("Reconstructed: {}\n", self.reconstructed.describe()));
        summary.push_str(&format!("ERA5 nearest cell: {}\n", self.reference.describe()));

        match self.reconstruction_improves() {
            Some(true) => summary.push_str("Reconstruction is closer to the measurements than ERA5\n"),
            Some(false) => summary.push_str("ERA5 is closer to the measurements than the reconstruction\n"),
            None => {}
        }

        summary
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
