pub mod comparison_builder;
pub mod gap_filler;
pub mod resampler;
pub mod statistics;

pub use comparison_builder::ComparisonBuilder;
pub use gap_filler::GapFiller;
pub use resampler::{daily_mean, diurnal_cycle, monthly_mean};
pub use statistics::{ComparisonStatistics, ErrorMetrics};
