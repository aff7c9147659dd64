use chrono::NaiveDateTime;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::{StationConverter, StationTable};
use crate::utils::constants::{
    COMBINED_PREFIX, FILLED_PREFIX, TOA5_EXTENSION, TOA5_MARKER, TOA5_MISSING, TOA5_RECORD,
    TOA5_TIMESTAMP, TOA5_TIME_FORMAT,
};

/// The four header lines of a TOA5 file
#[derive(Debug, Clone, PartialEq)]
pub struct Toa5Header {
    pub environment: Vec<String>,
    pub fields: Vec<String>,
    pub units: HashMap<String, String>,
    pub processing: HashMap<String, String>,
}

/// Station converter for Campbell Scientific TOA5 `.dat` logger files
#[derive(Debug, Clone)]
pub struct Toa5Converter {
    sensor: String,
    header: Toa5Header,
    table: StationTable,
}

impl Toa5Converter {
    /// Read a TOA5 file, using `sensor` as the air temperature column
    pub fn from_file(path: &Path, sensor: &str) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::missing_input(path, "Station file"));
        }
        let file = File::open(path)?;
        Self::from_reader(file, sensor)
    }

    pub fn from_reader<R: Read>(mut reader: R, sensor: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_text(&bytes);

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = csv_reader.records();
        let mut next_header = |what: &str| -> Result<StringRecord> {
            records
                .next()
                .transpose()?
                .ok_or_else(|| PipelineError::InvalidFormat(format!("TOA5 file is missing the {} line", what)))
        };

        let environment = next_header("environment")?;
        if environment.get(0) != Some(TOA5_MARKER) {
            return Err(PipelineError::InvalidFormat(format!(
                "Not a TOA5 file, first field is '{}'",
                environment.get(0).unwrap_or_default()
            )));
        }
        let fields = next_header("field names")?;
        let units = next_header("units")?;
        let processing = next_header("processing")?;

        let fields: Vec<String> = fields.iter().map(|f| f.trim().to_string()).collect();
        let timestamp_idx = fields
            .iter()
            .position(|f| f == TOA5_TIMESTAMP)
            .ok_or_else(|| PipelineError::InvalidFormat("TOA5 file has no TIMESTAMP column".to_string()))?;

        if !fields.iter().any(|f| f == sensor) {
            return Err(PipelineError::MissingData(format!(
                "Sensor column '{}' not found in TOA5 file",
                sensor
            )));
        }

        let data_columns: Vec<(usize, String)> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| *f != TOA5_TIMESTAMP && *f != TOA5_RECORD)
            .map(|(i, f)| (i, f.clone()))
            .collect();

        let mut index = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); data_columns.len()];

        for record in records {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let raw_ts = record.get(timestamp_idx).unwrap_or_default().trim();
            let timestamp = NaiveDateTime::parse_from_str(raw_ts, "%Y-%m-%d %H:%M:%S%.f")?;
            index.push(timestamp);

            for (slot, (col_idx, _)) in values.iter_mut().zip(&data_columns) {
                slot.push(parse_value(record.get(*col_idx).unwrap_or_default()));
            }
        }

        let mut table = StationTable::new(index);
        for ((_, name), column) in data_columns.iter().zip(values) {
            table.insert_column(name.clone(), column)?;
        }

        if !table.is_sorted() {
            tracing::warn!("TOA5 rows are out of order, sorting by timestamp");
            table.sort_by_index();
        }

        let header = Toa5Header {
            environment: environment.iter().map(str::to_string).collect(),
            units: zip_header(&fields, &units),
            processing: zip_header(&fields, &processing),
            fields,
        };

        tracing::debug!(rows = table.len(), columns = data_columns.len(), "read TOA5 file");

        Ok(Self {
            sensor: sensor.to_string(),
            header,
            table,
        })
    }

    pub fn header(&self) -> &Toa5Header {
        &self.header
    }

    /// Original field order first, any added columns after
    fn native_column_order(&self, table: &StationTable) -> Vec<String> {
        let mut order: Vec<String> = self
            .header
            .fields
            .iter()
            .filter(|f| table.column(f).is_some())
            .cloned()
            .collect();

        for name in table.column_names() {
            if !order.iter().any(|o| o == name) {
                order.push(name.to_string());
            }
        }
        order
    }

    fn unit_for(&self, column: &str) -> String {
        if let Some(unit) = self.header.units.get(column) {
            return unit.clone();
        }
        let derived_from = column
            .strip_prefix(FILLED_PREFIX)
            .or_else(|| column.strip_prefix(COMBINED_PREFIX));
        derived_from
            .and_then(|base| self.header.units.get(base))
            .cloned()
            .unwrap_or_else(|| "Deg C".to_string())
    }

    fn processing_for(&self, column: &str) -> String {
        self.header
            .processing
            .get(column)
            .cloned()
            .unwrap_or_else(|| "Smp".to_string())
    }
}

impl StationConverter for Toa5Converter {
    fn sensor_name(&self) -> &str {
        &self.sensor
    }

    fn original_table(&self) -> &StationTable {
        &self.table
    }

    fn to_native(&self, table: &StationTable) -> Result<StationTable> {
        let mut sorted = table.clone();
        sorted.sort_by_index();

        let mut native = StationTable::new(sorted.index().to_vec());
        for name in self.native_column_order(&sorted) {
            let values = sorted.column(&name).map(<[Option<f64>]>::to_vec).unwrap_or_default();
            native.insert_column(name, values)?;
        }
        Ok(native)
    }

    fn export_native(&self, table: &StationTable, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .flexible(true)
            .from_writer(BufWriter::new(file));

        let columns = table.column_names();

        writer.write_record(&self.header.environment)?;

        let mut fields = vec![TOA5_TIMESTAMP.to_string(), TOA5_RECORD.to_string()];
        fields.extend(columns.iter().map(|c| c.to_string()));
        writer.write_record(&fields)?;

        let mut units = vec!["TS".to_string(), "RN".to_string()];
        units.extend(columns.iter().map(|c| self.unit_for(c)));
        writer.write_record(&units)?;

        let mut processing = vec![String::new(), String::new()];
        processing.extend(columns.iter().map(|c| self.processing_for(c)));
        writer.write_record(&processing)?;

        for (row, timestamp) in table.index().iter().enumerate() {
            let mut record = vec![
                timestamp.format(TOA5_TIME_FORMAT).to_string(),
                row.to_string(),
            ];
            for column in table.columns() {
                record.push(format_value(column.values[row]));
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        tracing::info!(path = %path.display(), rows = table.len(), "exported TOA5 file");
        Ok(())
    }

    fn native_extension(&self) -> &str {
        TOA5_EXTENSION
    }
}

/// Loggers write either UTF-8 or Windows-1252 depending on firmware
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            if had_errors {
                tracing::warn!("TOA5 file contains undecodable bytes");
            }
            text.into_owned()
        }
    }
}

fn zip_header(fields: &[String], row: &StringRecord) -> HashMap<String, String> {
    fields
        .iter()
        .zip(row.iter())
        .map(|(f, v)| (f.clone(), v.to_string()))
        .collect()
}

fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(TOA5_MISSING) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let rounded = (v * 1_000_000.0).round() / 1_000_000.0;
            rounded.to_string()
        }
        _ => TOA5_MISSING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = "\"TOA5\",\"Karlsruhe\",\"CR1000\",\"1234\",\"CR1000.Std.32\",\"CPU:station.CR1\",\"5678\",\"Hourly\"\n\
\"TIMESTAMP\",\"RECORD\",\"AirTC_Avg\",\"RH\"\n\
\"TS\",\"RN\",\"Deg C\",\"%\"\n\
\"\",\"\",\"Avg\",\"Smp\"\n\
\"2023-07-15 01:00:00\",1,21.5,\"NAN\"\n\
\"2023-07-15 00:00:00\",0,\"NAN\",64.2\n\
\"2023-07-15 02:00:00\",2,20.25,63\n";

    #[test]
    fn test_read_sample() -> Result<()> {
        let converter = Toa5Converter::from_reader(SAMPLE.as_bytes(), "AirTC_Avg")?;
        let table = converter.original_table();

        assert_eq!(table.len(), 3);
        assert!(table.is_sorted());
        assert_eq!(table.column_names(), vec!["AirTC_Avg", "RH"]);
        assert_eq!(table.column("AirTC_Avg").unwrap(), &[None, Some(21.5), Some(20.25)]);
        assert_eq!(converter.header().units.get("RH").map(String::as_str), Some("%"));
        assert_eq!(converter.native_extension(), "dat");
        Ok(())
    }

    #[test]
    fn test_unknown_sensor() {
        let result = Toa5Converter::from_reader(SAMPLE.as_bytes(), "T107_C");
        assert!(matches!(result, Err(PipelineError::MissingData(_))));
    }

    #[test]
    fn test_not_toa5() {
        let result = Toa5Converter::from_reader("\"TOB1\",\"x\"\n".as_bytes(), "AirTC_Avg");
        assert!(matches!(result, Err(PipelineError::InvalidFormat(_))));
    }

    #[test]
    fn test_windows_1252_input() -> Result<()> {
        let mut bytes = SAMPLE.replace("Deg C", "\u{b0}C").into_bytes();
        // Re-encode the degree sign as a single Windows-1252 byte
        let pos = bytes.windows(2).position(|w| w == [0xC2, 0xB0]).unwrap();
        bytes.splice(pos..pos + 2, [0xB0]).for_each(drop);

        let converter = Toa5Converter::from_reader(bytes.as_slice(), "AirTC_Avg")?;
        assert_eq!(
            converter.header().units.get("AirTC_Avg").map(String::as_str),
            Some("\u{b0}C")
        );
        Ok(())
    }

    #[test]
    fn test_export_keeps_added_columns() -> Result<()> {
        let converter = Toa5Converter::from_reader(SAMPLE.as_bytes(), "AirTC_Avg")?;
        let mut table = converter.original_table().clone();
        table.insert_column("filled_AirTC_Avg", vec![Some(22.0), None, None])?;

        let native = converter.to_native(&table)?;
        assert_eq!(native.column_names(), vec!["AirTC_Avg", "RH", "filled_AirTC_Avg"]);

        let dir = TempDir::new()?;
        let path = dir.path().join("out.dat");
        converter.export_native(&native, &path)?;

        let reread = Toa5Converter::from_file(&path, "AirTC_Avg")?;
        assert_eq!(reread.original_table(), &native);
        assert_eq!(
            reread.header().units.get("filled_AirTC_Avg").map(String::as_str),
            Some("Deg C")
        );

        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with("\"TOA5\",\"Karlsruhe\""));
        assert!(text.contains("\"2023-07-15 00:00:00\",0,\"NAN\",64.2,22"));
        Ok(())
    }
}
