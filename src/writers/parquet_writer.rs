use crate::error::{PipelineError, Result};
use crate::models::{ComparisonRow, ComparisonTable};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE, MEASUREMENTS_LABEL, RECONSTRUCTED_LABEL, REFERENCE_LABEL,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const STATION_COLUMN: &str = "station";

/// Columnar export of a comparison table
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Configuration(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write the hourly comparison table, one row per timestamp
    pub fn write_comparison(&self, station: &str, table: &ComparisonTable, path: &Path) -> Result<()> {
        let schema = Self::schema();
        let batch = Self::table_to_batch(station, table, schema.clone())?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(path = %path.display(), rows = table.len(), "wrote parquet export");
        Ok(())
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(STATION_COLUMN, DataType::Utf8, false),
            Field::new("time", DataType::Timestamp(TimeUnit::Millisecond, None), false),
            Field::new(RECONSTRUCTED_LABEL, DataType::Float64, true),
            Field::new(REFERENCE_LABEL, DataType::Float64, true),
            Field::new(MEASUREMENTS_LABEL, DataType::Float64, true),
        ]))
    }

    fn table_to_batch(station: &str, table: &ComparisonTable, schema: Arc<Schema>) -> Result<RecordBatch> {
        let rows = table.rows();

        let stations: Vec<&str> = vec![station; rows.len()];
        let times: Vec<i64> = rows
            .iter()
            .map(|r| r.key.and_utc().timestamp_millis())
            .collect();
        let reconstructed: Vec<Option<f64>> = rows.iter().map(|r| r.reconstructed).collect();
        let reference: Vec<Option<f64>> = rows.iter().map(|r| r.reference).collect();
        let measured: Vec<Option<f64>> = rows.iter().map(|r| r.measured).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(stations)),
                Arc::new(TimestampMillisecondArray::from(times)),
                Arc::new(Float64Array::from(reconstructed)),
                Arc::new(Float64Array::from(reference)),
                Arc::new(Float64Array::from(measured)),
            ],
        )?;

        Ok(batch)
    }
}
