pub mod backend;
pub mod builder;
pub mod chart;
pub mod document;
pub mod sequence;

pub use backend::TextSafeBackend;
pub use builder::ReportBuilder;
pub use chart::{render_comparison, render_infill, ChartMode, SpatialContext};
pub use document::ReportDocument;
pub use sequence::{sample_window_start, ChartRequest, ReportPlan, ReportView, ReportViews};
