//! Calendar resampling of comparison tables.
//!
//! Every function returns a new table. Bins between the first and last
//! observed bin are always present; a bin with no value in a column carries
//! `None` for that column.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::models::{ComparisonRow, ComparisonTable, HourOfDay};

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RowAccumulator {
    reconstructed: MeanAccumulator,
    reference: MeanAccumulator,
    measured: MeanAccumulator,
}

impl RowAccumulator {
    fn push<K>(&mut self, row: &ComparisonRow<K>) {
        self.reconstructed.push(row.reconstructed);
        self.reference.push(row.reference);
        self.measured.push(row.measured);
    }

    fn finish<K>(&self, key: K) -> ComparisonRow<K> {
        ComparisonRow::new(
            key,
            self.reconstructed.mean(),
            self.reference.mean(),
            self.measured.mean(),
        )
    }
}

/// Mean per calendar day, labelled at midnight
pub fn daily_mean(table: &ComparisonTable) -> ComparisonTable {
    resample(table, |ts| ts.date(), |day| day.succ_opt(), midnight)
}

/// Mean per calendar month, labelled at midnight of the month's last day.
///
/// Callers building the report pass the daily table so that the result is a
/// mean of daily means.
pub fn monthly_mean(table: &ComparisonTable) -> ComparisonTable {
    resample(table, month_start, next_month, |start| {
        let last_day = next_month(start)
            .and_then(|next| next.pred_opt())
            .unwrap_or(start);
        midnight(last_day)
    })
}

/// Mean of all rows sharing an hour of the day
pub fn diurnal_cycle(table: &ComparisonTable) -> ComparisonTable<HourOfDay> {
    let mut bins: BTreeMap<HourOfDay, RowAccumulator> = BTreeMap::new();
    for row in table.rows() {
        bins.entry(HourOfDay::of(&row.key)).or_default().push(row);
    }

    ComparisonTable::from_rows(bins.into_iter().map(|(hour, acc)| acc.finish(hour)).collect())
}

fn resample(
    table: &ComparisonTable,
    bin_of: impl Fn(NaiveDateTime) -> NaiveDate,
    next_bin: impl Fn(NaiveDate) -> Option<NaiveDate>,
    label: impl Fn(NaiveDate) -> NaiveDateTime,
) -> ComparisonTable {
    let mut bins: BTreeMap<NaiveDate, RowAccumulator> = BTreeMap::new();
    for row in table.rows() {
        bins.entry(bin_of(row.key)).or_default().push(row);
    }

    let (first, last) = match (bins.keys().next(), bins.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return ComparisonTable::from_rows(Vec::new()),
    };

    let mut rows = Vec::with_capacity(bins.len());
    let mut bin = Some(first);
    while let Some(current) = bin.filter(|b| *b <= last) {
        let acc = bins.get(&current).copied().unwrap_or_default();
        rows.push(acc.finish(label(current)));
        bin = next_bin(current);
    }

    tracing::debug!(input = table.len(), output = rows.len(), "resampled comparison table");
    ComparisonTable::from_rows(rows)
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::default())
}

fn month_start(ts: NaiveDateTime) -> NaiveDate {
    ts.date() - Duration::days(i64::from(ts.day()) - 1)
}

fn next_month(start: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn row(ts: NaiveDateTime, value: f64) -> ComparisonRow<NaiveDateTime> {
        ComparisonRow::new(ts, Some(value), Some(value + 1.0), Some(value - 1.0))
    }

    #[test]
    fn test_daily_mean_labels_at_midnight() {
        let table = ComparisonTable::from_rows(vec![
            row(at(7, 15, 6), 10.0),
            row(at(7, 15, 18), 20.0),
            row(at(7, 16, 12), 30.0),
        ]);

        let daily = daily_mean(&table);

        assert_eq!(daily.keys().collect::<Vec<_>>(), vec![at(7, 15, 0), at(7, 16, 0)]);
        assert_eq!(daily.rows()[0].reconstructed, Some(15.0));
        assert_eq!(daily.rows()[0].measured, Some(14.0));
        assert_eq!(daily.rows()[1].reference, Some(31.0));
        // Input untouched
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_daily_mean_keeps_empty_days() {
        let table = ComparisonTable::from_rows(vec![row(at(7, 1, 0), 1.0), row(at(7, 3, 0), 3.0)]);

        let daily = daily_mean(&table);

        assert_eq!(daily.len(), 3);
        assert_eq!(daily.rows()[1].key, at(7, 2, 0));
        assert_eq!(daily.rows()[1].reconstructed, None);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let table = ComparisonTable::from_rows(vec![
            ComparisonRow::new(at(7, 1, 0), Some(2.0), None, Some(f64::NAN)),
            ComparisonRow::new(at(7, 1, 1), Some(4.0), None, Some(1.0)),
        ]);

        let daily = daily_mean(&table);

        assert_eq!(daily.rows()[0].reconstructed, Some(3.0));
        assert_eq!(daily.rows()[0].reference, None);
        assert_eq!(daily.rows()[0].measured, Some(1.0));
    }

    #[test]
    fn test_monthly_mean_of_daily_means_differs_from_raw_mean() {
        // Day one has 3 hourly samples averaging 10, day two a single sample of 40.
        let table = ComparisonTable::from_rows(vec![
            row(at(7, 1, 0), 5.0),
            row(at(7, 1, 1), 10.0),
            row(at(7, 1, 2), 15.0),
            row(at(7, 2, 0), 40.0),
        ]);

        let from_daily = monthly_mean(&daily_mean(&table));
        let from_raw = monthly_mean(&table);

        assert_eq!(from_daily.len(), 1);
        assert_eq!(from_daily.rows()[0].key, at(7, 31, 0));
        assert_eq!(from_daily.rows()[0].reconstructed, Some(25.0));
        assert_eq!(from_raw.rows()[0].reconstructed, Some(17.5));
    }

    #[test]
    fn test_monthly_mean_spans_year_end() {
        let dec = NaiveDate::from_ymd_opt(2022, 12, 20).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let table = ComparisonTable::from_rows(vec![row(dec, 1.0), row(at(2, 10, 0), 2.0)]);

        let monthly = monthly_mean(&table);

        assert_eq!(monthly.len(), 3);
        assert_eq!(
            monthly.rows()[0].key,
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(monthly.rows()[1].reconstructed, None);
        assert_eq!(monthly.rows()[2].key, at(2, 28, 0));
    }

    #[test]
    fn test_diurnal_cycle_groups_by_hour() {
        let table = ComparisonTable::from_rows(vec![
            row(at(7, 1, 0), 10.0),
            row(at(7, 1, 12), 20.0),
            row(at(7, 2, 0), 14.0),
            row(at(7, 2, 12), 24.0),
        ]);

        let diurnal = diurnal_cycle(&table);

        assert_eq!(diurnal.keys().collect::<Vec<_>>(), vec![HourOfDay(0), HourOfDay(12)]);
        assert_eq!(diurnal.rows()[0].reconstructed, Some(12.0));
        assert_eq!(diurnal.rows()[1].measured, Some(21.0));
    }

    #[test]
    fn test_empty_table() {
        let table = ComparisonTable::from_rows(Vec::new());
        assert!(daily_mean(&table).is_empty());
        assert!(monthly_mean(&table).is_empty());
        assert!(diurnal_cycle(&table).is_empty());
    }
}
