//! End-to-end gap filling and validation runs.

pub mod evaluation;
pub mod infill;
pub mod reference;
pub mod tool;
pub mod validation;

pub use evaluation::{CraiEvaluation, CraiEvaluationFactory, EvaluationFactory, EvaluationHelper};
pub use infill::{InfillOutput, InfillingWriter};
pub use reference::{
    GridCropper, GridFormatConverter, ReferenceAcquisition, ReferenceDownloader, ReferenceRequest,
};
pub use tool::{ExternalTool, LocalArchive, PreparedData, ToolVars};
pub use validation::{ValidationExecutor, ValidationReport, ValidationServices, ValidationSettings};
