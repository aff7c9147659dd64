use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::TimeSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Time-indexed table of optional numeric columns, the standard form every
/// station converter translates its native files to and from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationTable {
    index: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl StationTable {
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Add a column, replacing any existing column with the same name
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(PipelineError::InvalidFormat(format!(
                "Column '{}' has {} values but the table has {} rows",
                name,
                values.len(),
                self.index.len()
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    fn require_column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name).ok_or_else(|| {
            PipelineError::MissingData(format!("Column '{}' not found in station table", name))
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    pub fn is_sorted(&self) -> bool {
        self.index.windows(2).all(|w| w[0] <= w[1])
    }

    /// Reorder all rows by timestamp
    pub fn sort_by_index(&mut self) {
        if self.is_sorted() {
            return;
        }

        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by_key(|&i| self.index[i]);

        self.index = order.iter().map(|&i| self.index[i]).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    /// Overlay a series onto a column, matching rows by timestamp.
    ///
    /// Only rows whose timestamp exists in `series` with a non-NaN value are
    /// written; every other row keeps its current value. Returns the number
    /// of rows written.
    pub fn update_column(&mut self, name: &str, series: &TimeSeries) -> Result<usize> {
        let index = &self.index;
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                PipelineError::MissingData(format!("Column '{}' not found in station table", name))
            })?;

        let mut written = 0;
        for (slot, ts) in column.values.iter_mut().zip(index) {
            if let Some(value) = series.value_at(*ts) {
                *slot = Some(value);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Row-aligned first-non-missing of two columns
    pub fn combine_first(&self, primary: &str, fallback: &str) -> Result<Vec<Option<f64>>> {
        let primary = self.require_column(primary)?;
        let fallback = self.require_column(fallback)?;

        Ok(primary
            .iter()
            .zip(fallback)
            .map(|(p, f)| p.filter(|v| !v.is_nan()).or(*f))
            .collect())
    }

    /// Present values of one column as a time series
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        let values = self.require_column(name)?;
        let points = self
            .index
            .iter()
            .zip(values)
            .filter_map(|(ts, v)| v.map(|v| (*ts, v)))
            .collect();
        Ok(TimeSeries::from_points(name, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample_table() -> StationTable {
        StationTable::new(vec![hour(0), hour(1), hour(2), hour(3)])
            .with_column("AirTC", vec![Some(10.0), None, Some(12.0), None])
            .unwrap()
    }

    #[test]
    fn test_insert_rejects_wrong_length() {
        let mut table = sample_table();
        assert!(table.insert_column("bad", vec![Some(1.0)]).is_err());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut table = sample_table();
        table.insert_column("AirTC", vec![None; 4]).unwrap();

        assert_eq!(table.columns().len(), 1);
        assert_eq!(table.column("AirTC").unwrap(), &[None, None, None, None]);
    }

    #[test]
    fn test_sort_by_index_moves_columns() {
        let mut table = StationTable::new(vec![hour(2), hour(0), hour(1)])
            .with_column("AirTC", vec![Some(2.0), Some(0.0), None])
            .unwrap();
        assert!(!table.is_sorted());

        table.sort_by_index();

        assert_eq!(table.index(), &[hour(0), hour(1), hour(2)]);
        assert_eq!(table.column("AirTC").unwrap(), &[Some(0.0), None, Some(2.0)]);
    }

    #[test]
    fn test_update_column_only_touches_matching_rows() {
        let mut table = sample_table();
        table.insert_column("filled_AirTC", vec![None; 4]).unwrap();

        let predicted = TimeSeries::from_parts("p", vec![hour(1), hour(3), hour(9)], vec![11.0, f64::NAN, 99.0]);
        let written = table.update_column("filled_AirTC", &predicted).unwrap();

        assert_eq!(written, 1);
        assert_eq!(table.column("filled_AirTC").unwrap(), &[None, Some(11.0), None, None]);
    }

    #[test]
    fn test_combine_first() {
        let table = sample_table()
            .with_column("filled", vec![Some(9.0), Some(11.0), Some(9.0), None])
            .unwrap();

        let combined = table.combine_first("AirTC", "filled").unwrap();
        assert_eq!(combined, vec![Some(10.0), Some(11.0), Some(12.0), None]);
    }

    #[test]
    fn test_combine_first_missing_column() {
        let table = sample_table();
        assert!(table.combine_first("AirTC", "nope").is_err());
    }

    #[test]
    fn test_series_skips_missing() {
        let series = sample_table().series("AirTC").unwrap();
        assert_eq!(series.timestamps(), &[hour(0), hour(2)]);
    }
}
