use std::path::{Path, PathBuf};

use crate::archive::ScopedWorkspace;
use crate::error::{PipelineError, Result};
use crate::models::Station;
use crate::processors::GapFiller;
use crate::readers::DatasetReader;
use crate::report::render_infill;
use crate::utils::constants::{
    DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH, DEFAULT_TAS_VARIABLE, PHASE_EXPORTING,
    PHASE_INFILLING, PHASE_PLOTTING,
};
use crate::utils::{infilled_file_name, NoProgress, PhaseGuard, ProgressSink};

/// Files produced by one [`InfillingWriter::write_results`] call
#[derive(Debug, Clone, PartialEq)]
pub struct InfillOutput {
    pub export_path: PathBuf,
    pub plot_path: Option<PathBuf>,
}

/// Writes a station's observations with reconstruction-filled gaps back
/// into the station's native format.
///
/// All output lands in a private workspace that lives as long as the writer.
pub struct InfillingWriter<R: DatasetReader> {
    reader: R,
    variable: String,
    chart_size: (u32, u32),
    workspace: ScopedWorkspace,
}

impl<R: DatasetReader> InfillingWriter<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            reader,
            variable: DEFAULT_TAS_VARIABLE.to_string(),
            chart_size: (DEFAULT_CHART_WIDTH, DEFAULT_CHART_HEIGHT),
            workspace: ScopedWorkspace::with_prefix("infill-")?,
        })
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn with_chart_size(mut self, width: u32, height: u32) -> Self {
        self.chart_size = (width, height);
        self
    }

    pub fn workspace_dir(&self) -> &Path {
        self.workspace.path()
    }

    pub fn write_results(&self, eval_path: &Path, station: &Station, plot: bool) -> Result<InfillOutput> {
        self.write_results_with_progress(eval_path, station, plot, &NoProgress)
    }

    /// Same as [`InfillingWriter::write_results`], reporting phases to `progress`
    pub fn write_results_with_progress(
        &self,
        eval_path: &Path,
        station: &Station,
        plot: bool,
        progress: &dyn ProgressSink,
    ) -> Result<InfillOutput> {
        if !eval_path.exists() {
            return Err(PipelineError::missing_input(eval_path, "Evaluation results"));
        }

        let guard = PhaseGuard::new(progress);
        guard.enter(PHASE_INFILLING);

        let converter = station.converter();
        let filler = GapFiller::new(converter.sensor_name());

        let grid = self.reader.read_variable(eval_path, &self.variable)?;
        let predicted = filler.predicted_series(&grid);

        let plot_path = if plot {
            guard.enter(PHASE_PLOTTING);
            let path = self.workspace.unique_path("png");
            render_infill(&station.measurements()?, &predicted, self.chart_size, &path)?;
            tracing::debug!(path = %path.display(), "rendered gap-fill chart");
            Some(path)
        } else {
            None
        };

        guard.enter(PHASE_EXPORTING);
        let merged = filler.merge(converter.original_table(), &predicted)?;
        let native = converter.to_native(&merged)?;

        let (first, last) = match (native.first_timestamp(), native.last_timestamp()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(PipelineError::MissingData(
                    "Station has no observations".to_string(),
                ))
            }
        };
        let export_path = self
            .workspace
            .join(infilled_file_name(first, last, converter.native_extension()));
        converter.export_native(&native, &export_path)?;

        tracing::info!(
            station = station.name.as_deref().unwrap_or("unnamed"),
            path = %export_path.display(),
            "wrote gap-filled station data"
        );

        Ok(InfillOutput {
            export_path,
            plot_path,
        })
    }

    /// Remove the workspace and everything written into it
    pub fn cleanup(self) -> Result<()> {
        self.workspace.close()
    }
}
