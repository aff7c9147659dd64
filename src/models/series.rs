use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A named scalar time series, sorted ascending by timestamp.
///
/// NaN values are kept in storage but reported as missing by [`TimeSeries::value_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    name: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from points in any order.
    ///
    /// Points are stably sorted by timestamp; for duplicated timestamps the
    /// first occurrence wins.
    pub fn from_points(name: impl Into<String>, mut points: Vec<(NaiveDateTime, f64)>) -> Self {
        let name = name.into();
        points.sort_by_key(|(ts, _)| *ts);

        let before = points.len();
        points.dedup_by_key(|(ts, _)| *ts);
        if points.len() != before {
            tracing::warn!(
                series = %name,
                dropped = before - points.len(),
                "duplicate timestamps in series, keeping first occurrence"
            );
        }

        let (timestamps, values) = points.into_iter().unzip();
        Self {
            name,
            timestamps,
            values,
        }
    }

    /// Build a series from parallel timestamp and value vectors
    pub fn from_parts(
        name: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Self {
        let points = timestamps.into_iter().zip(values).collect();
        Self::from_points(name, points)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at an exact timestamp; `None` when absent or NaN
    pub fn value_at(&self, timestamp: NaiveDateTime) -> Option<f64> {
        self.timestamps
            .binary_search(&timestamp)
            .ok()
            .map(|i| self.values[i])
            .filter(|v| !v.is_nan())
    }

    /// Apply a function to every value
    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for value in &mut self.values {
            *value = f(*value);
        }
        self
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }
}
