pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod readers;
pub mod report;
pub mod utils;
pub mod writers;

pub use error::{PipelineError, Result};
