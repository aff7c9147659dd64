//! Run configuration from an optional TOML file and `STATION_TWIN__*`
//! environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::pipeline::{ExternalTool, ValidationSettings};
use crate::utils::constants::{DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH, DEFAULT_TAS_VARIABLE};

const ENV_PREFIX: &str = "STATION_TWIN";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    #[validate(nested)]
    pub infill: InfillConfig,

    #[validate(nested)]
    pub validation: ValidationSettings,

    pub tools: ToolsConfig,

    /// Directory of pre-fetched reference files, used instead of `tools.download`
    pub reference_archive: Option<PathBuf>,
}

/// Gap-fill writer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InfillConfig {
    pub variable: String,
    #[validate(range(min = 100))]
    pub chart_width: u32,
    #[validate(range(min = 100))]
    pub chart_height: u32,
}

impl Default for InfillConfig {
    fn default() -> Self {
        Self {
            variable: DEFAULT_TAS_VARIABLE.to_string(),
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
        }
    }
}

/// Command templates for the external steps of a validation run.
///
/// `download` sees `{station}`, `{latitude}`, `{longitude}`, `{start}`,
/// `{end}` and `{output}`; `convert` sees `{input}` and `{output}`; `crop`
/// sees all of them. `evaluate` sees `{args}`, `{workspace}` and `{model}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub download: Option<ExternalTool>,
    pub convert: Option<ExternalTool>,
    pub crop: Option<ExternalTool>,
    pub evaluate: Option<ExternalTool>,
}

impl PipelineConfig {
    /// Defaults, overridden by `path` if given, overridden by the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(PipelineError::missing_input(path, "Configuration file"));
            }
            builder = builder.add_source(File::from(path));
        }

        let config: PipelineConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        tracing::debug!(
            file = ?path,
            variable = %config.validation.variable,
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn validation_settings(&self) -> ValidationSettings {
        self.validation.clone()
    }
}
