pub mod csv_writer;
pub mod parquet_writer;

pub use csv_writer::{write_comparison, write_comparison_csv};
pub use parquet_writer::ParquetWriter;
