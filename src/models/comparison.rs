use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row key of a comparison table, placed on a chart's x axis
pub trait AxisKey: Copy + PartialOrd + fmt::Debug {
    /// Position on a continuous axis
    fn position(&self) -> f64;

    /// Inverse of [`AxisKey::position`], used for tick labels
    fn label_at(position: f64) -> String;
}

impl AxisKey for NaiveDateTime {
    fn position(&self) -> f64 {
        self.and_utc().timestamp() as f64 / 3600.0
    }

    fn label_at(position: f64) -> String {
        let seconds = (position * 3600.0).round() as i64;
        chrono::DateTime::from_timestamp(seconds, 0)
            .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Hour of the day, 0..=23
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HourOfDay(pub u32);

impl HourOfDay {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        HourOfDay(timestamp.hour())
    }
}

impl AxisKey for HourOfDay {
    fn position(&self) -> f64 {
        self.0 as f64
    }

    fn label_at(position: f64) -> String {
        format!("{:02}:00", position.round() as i64)
    }
}

impl fmt::Display for HourOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow<K> {
    pub key: K,
    pub reconstructed: Option<f64>,
    pub reference: Option<f64>,
    pub measured: Option<f64>,
}

impl<K> ComparisonRow<K> {
    pub fn new(key: K, reconstructed: Option<f64>, reference: Option<f64>, measured: Option<f64>) -> Self {
        Self {
            key,
            reconstructed,
            reference,
            measured,
        }
    }

    /// Reconstructed minus measured
    pub fn reconstructed_delta(&self) -> Option<f64> {
        Some(self.reconstructed? - self.measured?)
    }

    /// Reference minus measured
    pub fn reference_delta(&self) -> Option<f64> {
        Some(self.reference? - self.measured?)
    }
}

/// Reconstructed, reference and measured values aligned on a shared index.
///
/// Transformations (windows, resampling) produce new tables; a table is
/// never modified in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable<K = NaiveDateTime> {
    rows: Vec<ComparisonRow<K>>,
}

impl<K: AxisKey> ComparisonTable<K> {
    /// Build a table, ordering rows by key
    pub fn from_rows(mut rows: Vec<ComparisonRow<K>>) -> Self {
        rows.sort_by(|a, b| {
            a.key
                .partial_cmp(&b.key)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { rows }
    }

    pub fn rows(&self) -> &[ComparisonRow<K>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.rows.iter().map(|r| r.key)
    }

    /// `len` consecutive rows starting at `start`, clamped to the table
    pub fn window(&self, start: usize, len: usize) -> Self {
        let start = start.min(self.rows.len());
        let end = start.saturating_add(len).min(self.rows.len());
        Self {
            rows: self.rows[start..end].to_vec(),
        }
    }
}
