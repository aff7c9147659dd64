pub mod cf_time;
pub mod dataset;
#[cfg(feature = "netcdf")]
pub mod netcdf_reader;
pub mod toa5;

pub use cf_time::TimeUnits;
pub use dataset::{DatasetReader, InMemoryReader};
#[cfg(feature = "netcdf")]
pub use netcdf_reader::NetcdfReader;
pub use toa5::{Toa5Converter, Toa5Header};
