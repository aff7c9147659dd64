pub mod comparison;
pub mod grid;
pub mod series;
pub mod station;
pub mod table;

pub use comparison::{AxisKey, ComparisonRow, ComparisonTable, HourOfDay};
pub use grid::GridDataset;
pub use series::TimeSeries;
pub use station::{Station, StationConverter, StationLocation, StationMetadata};
pub use table::{Column, StationTable};
