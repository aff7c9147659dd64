pub mod bundle;
pub mod workspace;

pub use bundle::{bundle_directory, is_report_artifact};
pub use workspace::ScopedWorkspace;
