pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod logging;
pub mod progress;
pub mod units;

pub use constants::*;
pub use coordinates::{align_longitude, nearest_index};
pub use filename::{infilled_file_name, unique_file_name};
pub use progress::{NoProgress, PhaseGuard, PhaseLog, ProgressReporter, ProgressSink};
pub use units::{is_celsius, series_to_celsius, to_celsius};
