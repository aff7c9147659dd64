use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::models::ComparisonTable;
use crate::utils::constants::{
    CSV_TIME_LABEL, MEASUREMENTS_LABEL, RECONSTRUCTED_LABEL, REFERENCE_LABEL, TOA5_TIME_FORMAT,
};

/// Write a comparison table as `time,Reconstructed,ERA5,Measurements`.
///
/// Missing values are written as empty fields.
pub fn write_comparison_csv(table: &ComparisonTable, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_comparison(table, BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows = table.len(), "wrote comparison csv");
    Ok(())
}

pub fn write_comparison<W: Write>(table: &ComparisonTable, out: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(out);

    writer.write_record([
        CSV_TIME_LABEL,
        RECONSTRUCTED_LABEL,
        REFERENCE_LABEL,
        MEASUREMENTS_LABEL,
    ])?;

    for row in table.rows() {
        writer.write_record([
            row.key.format(TOA5_TIME_FORMAT).to_string(),
            format_value(row.reconstructed),
            format_value(row.reference),
            format_value(row.measured),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComparisonRow;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_and_missing_values() {
        let ts = NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let table = ComparisonTable::from_rows(vec![ComparisonRow::new(ts, Some(12.5), None, Some(11.0))]);

        let mut buffer = Vec::new();
        write_comparison(&table, &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "time,Reconstructed,ERA5,Measurements\n2023-07-15 06:00:00,12.5,,11\n"
        );
    }
}
