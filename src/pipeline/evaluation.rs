use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ScopedWorkspace;
use crate::error::{PipelineError, Result};
use crate::models::{Station, TimeSeries};
use crate::pipeline::tool::{ExternalTool, ToolVars};
use crate::utils::constants::{CSV_TIME_LABEL, DEFAULT_TAS_VARIABLE, REFERENCE_FILE, TOA5_TIME_FORMAT};

const EVAL_ARGS_FILE: &str = "eval_args.txt";
const EVAL_OUTPUT_DIR: &str = "output";
const EVAL_OUTPUT_FILE: &str = "output.nc";

/// One run of a trained model over reference data for a station
pub trait EvaluationHelper {
    /// Where the helper expects its reference dataset
    fn reference_path(&self) -> PathBuf;

    /// Write the station's cleaned measurements as the expected output
    fn create_cleaned_reference(&mut self) -> Result<PathBuf>;

    /// Write the argument file for the reconstruction routine
    fn write_eval_args(&mut self) -> Result<PathBuf>;

    /// Run the reconstruction and return the path of its output dataset
    fn evaluate(&mut self, args_path: &Path) -> Result<PathBuf>;
}

/// Creates evaluation helpers for a station and a trained model
pub trait EvaluationFactory {
    fn create(&self, station: &Station, model_path: &Path) -> Result<Box<dyn EvaluationHelper>>;

    /// A helper primed with reference data that was already acquired,
    /// so it does not fetch its own.
    fn with_reference_data(
        &self,
        station: &Station,
        model_path: &Path,
        reference: &Path,
    ) -> Result<Box<dyn EvaluationHelper>> {
        if !reference.exists() {
            return Err(PipelineError::missing_input(reference, "Reference data"));
        }

        let helper = self.create(station, model_path)?;
        let target = helper.reference_path();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(reference, &target)?;
        tracing::debug!(from = %reference.display(), to = %target.display(), "primed evaluation with reference data");

        Ok(helper)
    }
}

/// Builds [`CraiEvaluation`]s that call the reconstruction routine as an
/// external program
#[derive(Debug, Clone)]
pub struct CraiEvaluationFactory {
    tool: ExternalTool,
    variable: String,
}

impl CraiEvaluationFactory {
    pub fn new(tool: ExternalTool) -> Self {
        Self {
            tool,
            variable: DEFAULT_TAS_VARIABLE.to_string(),
        }
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }
}

impl EvaluationFactory for CraiEvaluationFactory {
    fn create(&self, station: &Station, model_path: &Path) -> Result<Box<dyn EvaluationHelper>> {
        let evaluation = CraiEvaluation {
            tool: self.tool.clone(),
            variable: self.variable.clone(),
            sensor: station.converter().sensor_name().to_string(),
            measurements: station.measurements()?,
            model_path: model_path.to_path_buf(),
            cleaned_path: None,
            workspace: ScopedWorkspace::with_prefix("crai-eval-")?,
        };
        Ok(Box::new(evaluation))
    }
}

/// Evaluation workspace laid out for the reconstruction routine:
/// reference data, expected output, an argument file and an output directory.
pub struct CraiEvaluation {
    tool: ExternalTool,
    variable: String,
    sensor: String,
    measurements: TimeSeries,
    model_path: PathBuf,
    cleaned_path: Option<PathBuf>,
    workspace: ScopedWorkspace,
}

impl CraiEvaluation {
    fn output_dir(&self) -> PathBuf {
        self.workspace.join(EVAL_OUTPUT_DIR)
    }
}

impl EvaluationHelper for CraiEvaluation {
    fn reference_path(&self) -> PathBuf {
        self.workspace.join(REFERENCE_FILE)
    }

    fn create_cleaned_reference(&mut self) -> Result<PathBuf> {
        let path = self.workspace.join(format!("cleaned_{}.csv", self.sensor));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([CSV_TIME_LABEL, self.sensor.as_str()])?;

        let mut written = 0;
        for (ts, value) in self.measurements.iter().filter(|(_, v)| v.is_finite()) {
            writer.write_record([ts.format(TOA5_TIME_FORMAT).to_string(), value.to_string()])?;
            written += 1;
        }
        writer.flush()?;

        if written == 0 {
            return Err(PipelineError::MissingData(format!(
                "Sensor '{}' has no measurements to evaluate against",
                self.sensor
            )));
        }

        tracing::debug!(rows = written, path = %path.display(), "wrote cleaned measurements");
        self.cleaned_path = Some(path.clone());
        Ok(path)
    }

    fn write_eval_args(&mut self) -> Result<PathBuf> {
        let cleaned = match &self.cleaned_path {
            Some(path) => path.clone(),
            None => self.create_cleaned_reference()?,
        };
        let model_dir = self.model_path.parent().unwrap_or_else(|| Path::new("."));
        let model_name = self
            .model_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::InvalidFormat("Invalid model path".to_string()))?;

        fs::create_dir_all(self.output_dir())?;

        let lines = [
            format!("--data-root-dir {}", self.workspace.path().display()),
            format!("--model-dir {}", model_dir.display()),
            format!("--model-names {}", model_name),
            format!("--data-names {}", REFERENCE_FILE),
            format!("--data-types {}", self.variable),
            format!("--evaluation-dirs {}", self.output_dir().display()),
            format!("--expected-output {}", cleaned.display()),
        ];

        let path = self.workspace.join(EVAL_ARGS_FILE);
        fs::write(&path, lines.join("\n") + "\n")?;
        Ok(path)
    }

    fn evaluate(&mut self, args_path: &Path) -> Result<PathBuf> {
        if !args_path.exists() {
            return Err(PipelineError::missing_input(args_path, "Evaluation arguments"));
        }

        let mut vars = ToolVars::new();
        vars.insert("args", args_path.display().to_string());
        vars.insert("workspace", self.workspace.path().display().to_string());
        vars.insert("model", self.model_path.display().to_string());

        tracing::info!(model = %self.model_path.display(), "running reconstruction");
        self.tool.run(&vars)?;

        let output = self.output_dir().join(EVAL_OUTPUT_FILE);
        if !output.exists() {
            return Err(PipelineError::missing_input(output, "Reconstruction output"));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StationConverter, StationMetadata, StationTable};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct FixedConverter {
        table: StationTable,
    }

    impl StationConverter for FixedConverter {
        fn sensor_name(&self) -> &str {
            "AirTC"
        }

        fn original_table(&self) -> &StationTable {
            &self.table
        }

        fn to_native(&self, table: &StationTable) -> Result<StationTable> {
            Ok(table.clone())
        }

        fn export_native(&self, _table: &StationTable, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn native_extension(&self) -> &str {
            "dat"
        }
    }

    fn station() -> Station {
        let day = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        let table = StationTable::new(vec![
            day.and_hms_opt(0, 0, 0).unwrap(),
            day.and_hms_opt(1, 0, 0).unwrap(),
            day.and_hms_opt(2, 0, 0).unwrap(),
        ])
        .with_column("AirTC", vec![Some(11.0), None, Some(12.5)])
        .unwrap();

        Station::new(
            Some("Karlsruhe".to_string()),
            StationMetadata::new(49.0, 8.4),
            Box::new(FixedConverter { table }),
        )
    }

    #[test]
    fn test_reference_data_is_copied_into_helper() -> Result<()> {
        let dir = TempDir::new()?;
        let reference = dir.path().join(REFERENCE_FILE);
        fs::write(&reference, b"era5")?;

        let factory = CraiEvaluationFactory::new(ExternalTool::new("true", &[]));
        let helper = factory.with_reference_data(&station(), &dir.path().join("model.pt"), &reference)?;

        assert_eq!(fs::read(helper.reference_path())?, b"era5");
        Ok(())
    }

    #[test]
    fn test_missing_reference_data() {
        let factory = CraiEvaluationFactory::new(ExternalTool::new("true", &[]));
        let result = factory.with_reference_data(
            &station(),
            Path::new("model.pt"),
            Path::new("/nonexistent/era5_for_station.nc"),
        );
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
    }

    #[test]
    fn test_cleaned_reference_and_args() -> Result<()> {
        let factory = CraiEvaluationFactory::new(ExternalTool::new("true", &[])).with_variable("t2m");
        let mut helper = factory.create(&station(), Path::new("/models/karlsruhe/model.pt"))?;

        let cleaned = helper.create_cleaned_reference()?;
        let text = fs::read_to_string(&cleaned)?;
        assert_eq!(
            text,
            "time,AirTC\n2023-07-15 00:00:00,11\n2023-07-15 02:00:00,12.5\n"
        );

        let args = fs::read_to_string(helper.write_eval_args()?)?;
        assert!(args.contains("--model-dir /models/karlsruhe\n"));
        assert!(args.contains("--model-names model.pt\n"));
        assert!(args.contains("--data-names era5_for_station.nc\n"));
        assert!(args.contains("--data-types t2m\n"));
        assert!(args.contains(&format!("--expected-output {}\n", cleaned.display())));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_evaluate_requires_output() -> Result<()> {
        let factory = CraiEvaluationFactory::new(ExternalTool::new("true", &["{args}"]));
        let mut helper = factory.create(&station(), Path::new("/models/model.pt"))?;
        let args = helper.write_eval_args()?;

        let result = helper.evaluate(&args);
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_evaluate_returns_output() -> Result<()> {
        let tool = ExternalTool::new("touch", &["{workspace}/output/output.nc"]);
        let mut helper = CraiEvaluationFactory::new(tool).create(&station(), Path::new("/models/model.pt"))?;
        let args = helper.write_eval_args()?;

        let output = helper.evaluate(&args)?;
        assert!(output.ends_with("output/output.nc"));
        assert!(output.exists());
        Ok(())
    }
}
