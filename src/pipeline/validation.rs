use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::archive::{bundle_directory, ScopedWorkspace};
use crate::error::{PipelineError, Result};
use crate::models::{Station, StationLocation};
use crate::pipeline::evaluation::EvaluationFactory;
use crate::pipeline::reference::{
    GridCropper, GridFormatConverter, ReferenceAcquisition, ReferenceDownloader, ReferenceRequest,
};
use crate::processors::{ComparisonBuilder, ComparisonStatistics};
use crate::readers::DatasetReader;
use crate::report::{ReportBuilder, ReportPlan, ReportViews, SpatialContext};
use crate::utils::constants::*;
use crate::utils::{PhaseGuard, ProgressSink};
use crate::writers::{write_comparison_csv, ParquetWriter};

/// Tunables of a validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ValidationSettings {
    /// Variable read from the reconstruction
    pub variable: String,
    /// Variable read from the cropped reference data
    pub reference_variable: String,

    pub window_count: usize,
    #[validate(range(min = 1))]
    pub window_steps: usize,

    #[validate(range(min = 100))]
    pub chart_width: u32,
    #[validate(range(min = 100))]
    pub chart_height: u32,

    /// Pins the choice of sample windows; random when unset
    pub seed: Option<u64>,

    pub write_summary: bool,
    pub write_parquet: bool,
    pub compression: String,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            variable: DEFAULT_TAS_VARIABLE.to_string(),
            reference_variable: DEFAULT_TAS_VARIABLE.to_string(),
            window_count: DEFAULT_WINDOW_COUNT,
            window_steps: DEFAULT_WINDOW_STEPS,
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
            seed: None,
            write_summary: true,
            write_parquet: false,
            compression: COMPRESSION_SNAPPY.to_string(),
        }
    }
}

/// Collaborators a validation run delegates to
pub struct ValidationServices<'a> {
    pub downloader: &'a dyn ReferenceDownloader,
    pub converter: &'a dyn GridFormatConverter,
    pub cropper: &'a dyn GridCropper,
    pub evaluation: &'a dyn EvaluationFactory,
    pub reader: &'a dyn DatasetReader,
}

/// Everything a finished validation run wrote into its workspace
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub pdf_path: PathBuf,
    pub csv_path: PathBuf,
    pub charts: Vec<PathBuf>,
    pub statistics: ComparisonStatistics,
    pub summary_path: Option<PathBuf>,
    pub parquet_path: Option<PathBuf>,
}

/// Compares a trained station model against ERA5 and the station's own
/// measurements, producing a PDF report and a CSV table.
pub struct ValidationExecutor<'a> {
    station: &'a Station,
    location: StationLocation,
    model_path: PathBuf,
    progress: &'a dyn ProgressSink,
    settings: ValidationSettings,
    workspace: ScopedWorkspace,
}

impl<'a> ValidationExecutor<'a> {
    /// Check the station and settings and create the workspace.
    ///
    /// Reports the `Validating` phase, and the idle phase again if any check fails.
    pub fn new(
        station: &'a Station,
        model_path: impl Into<PathBuf>,
        progress: &'a dyn ProgressSink,
        settings: ValidationSettings,
    ) -> Result<Self> {
        progress.update_phase(PHASE_VALIDATING);

        let prepared = settings.validate().map_err(PipelineError::from).and_then(|_| {
            let location = station.location()?;
            let workspace = ScopedWorkspace::with_prefix("validation-")?;
            Ok((location, workspace))
        });

        match prepared {
            Ok((location, workspace)) => Ok(Self {
                station,
                location,
                model_path: model_path.into(),
                progress,
                settings,
                workspace,
            }),
            Err(e) => {
                progress.update_phase(PHASE_IDLE);
                Err(e)
            }
        }
    }

    /// Create and run in one go
    pub fn execute(
        station: &'a Station,
        model_path: impl Into<PathBuf>,
        progress: &'a dyn ProgressSink,
        settings: ValidationSettings,
        services: &ValidationServices<'_>,
    ) -> Result<(Self, ValidationReport)> {
        let executor = Self::new(station, model_path, progress, settings)?;
        let report = executor.run(services)?;
        Ok((executor, report))
    }

    /// Acquire reference data, evaluate the model and write the report.
    ///
    /// The phase is back to idle when this returns, whether it succeeded or not.
    pub fn run(&self, services: &ValidationServices<'_>) -> Result<ValidationReport> {
        let guard = PhaseGuard::new(self.progress);

        let (start, end) = self.station.time_window()?;
        let request = ReferenceRequest::new(&self.location, start, end);
        let reference_path = ReferenceAcquisition::new(services.downloader, services.converter, services.cropper)
            .acquire(&request, &self.workspace, self.progress)?;

        self.validate(services, &reference_path, &guard)
    }

    fn validate(
        &self,
        services: &ValidationServices<'_>,
        reference_path: &Path,
        guard: &PhaseGuard<'_>,
    ) -> Result<ValidationReport> {
        if !self.model_path.exists() {
            return Err(PipelineError::missing_input(&self.model_path, "Trained model"));
        }
        if !reference_path.exists() {
            return Err(PipelineError::missing_input(reference_path, "Reference data"));
        }

        guard.enter(PHASE_EVALUATING);
        let mut helper = services
            .evaluation
            .with_reference_data(self.station, &self.model_path, reference_path)?;
        helper.create_cleaned_reference()?;
        let args_path = helper.write_eval_args()?;
        let reconstructed_path = helper.evaluate(&args_path)?;

        guard.enter(PHASE_PLOTTING);
        let reconstructed = services
            .reader
            .read_variable(&reconstructed_path, &self.settings.variable)?;
        let reference = services
            .reader
            .read_variable(reference_path, &self.settings.reference_variable)?;
        let measured = self.station.measurements()?;

        let table = ComparisonBuilder::new(&self.location).build(&reconstructed, &reference, &measured)?;

        let csv_path = self.csv_path();
        write_comparison_csv(&table, &csv_path)?;

        let statistics = ComparisonStatistics::from_table(&self.location.name, &table);
        tracing::info!("{}", statistics.summary());

        let summary_path = if self.settings.write_summary {
            let path = self.workspace.join(REPORT_SUMMARY_FILE);
            statistics.write_json(&path)?;
            Some(path)
        } else {
            None
        };

        let parquet_path = if self.settings.write_parquet {
            let path = self.workspace.join(REPORT_PARQUET_FILE);
            ParquetWriter::new()
                .with_compression(&self.settings.compression)?
                .write_comparison(&self.location.name, &table, &path)?;
            Some(path)
        } else {
            None
        };

        let context = SpatialContext {
            station_lat: self.location.latitude,
            station_lon: self.location.longitude,
            grid_lats: reference.lats().to_vec(),
            grid_lons: reference.lons().to_vec(),
        };
        let views = ReportViews::from_hourly(table);
        let plan = ReportPlan::build(
            &self.location.name,
            views.hourly.len(),
            self.settings.window_count,
            self.settings.window_steps,
            &mut self.rng(),
        );

        let pdf_path = self.pdf_path();
        let chart_size = (self.settings.chart_width, self.settings.chart_height);
        let charts = ReportBuilder::new(self.workspace.path(), chart_size).build(
            &self.location.name,
            &plan,
            &views,
            &context,
            &pdf_path,
        )?;

        tracing::info!(
            station = %self.location.name,
            pages = charts.len(),
            pdf = %pdf_path.display(),
            "validation report written"
        );

        Ok(ValidationReport {
            pdf_path,
            csv_path,
            charts,
            statistics,
            summary_path,
            parquet_path,
        })
    }

    fn rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.workspace.join(REPORT_PDF_FILE)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.workspace.join(REPORT_CSV_FILE)
    }

    pub fn workspace_dir(&self) -> &Path {
        self.workspace.path()
    }

    pub fn location(&self) -> &StationLocation {
        &self.location
    }

    /// Bundle every chart, PDF and CSV in the workspace into `validation.zip`
    pub fn make_zip(&self) -> Result<PathBuf> {
        let zip_path = self.workspace.join(REPORT_ZIP_FILE);
        let names = bundle_directory(self.workspace.path(), &zip_path)?;
        tracing::info!(files = names.len(), path = %zip_path.display(), "bundled validation report");
        Ok(zip_path)
    }

    /// Remove the workspace and all report files
    pub fn close(self) -> Result<()> {
        self.workspace.close()
    }
}
