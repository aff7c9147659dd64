use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PipelineError, Result};
use crate::pipeline::reference::{GridCropper, GridFormatConverter, ReferenceDownloader, ReferenceRequest};
use crate::utils::ProgressSink;

const REQUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Values substituted into `{name}` placeholders of a tool's arguments
pub type ToolVars = BTreeMap<&'static str, String>;

/// Command template for an external program.
///
/// Each argument may contain `{name}` placeholders, replaced before the
/// program is spawned. Unknown placeholders are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTool {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn render_args(&self, vars: &ToolVars) -> Vec<String> {
        self.args.iter().map(|arg| substitute(arg, vars)).collect()
    }

    /// Run to completion and return its standard output
    pub fn run(&self, vars: &ToolVars) -> Result<String> {
        let args = self.render_args(vars);
        tracing::debug!(program = %self.program, ?args, "running external tool");

        let output = Command::new(&self.program).args(&args).output().map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to run {}: {}", self.program, e),
            ))
        })?;

        if !output.status.success() {
            return Err(PipelineError::Tool {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn substitute(template: &str, vars: &ToolVars) -> String {
    vars.iter().fold(template.to_string(), |arg, (name, value)| {
        arg.replace(&format!("{{{}}}", name), value)
    })
}

fn path_var(path: &Path) -> String {
    path.display().to_string()
}

fn request_vars(request: &ReferenceRequest) -> ToolVars {
    let mut vars = ToolVars::new();
    vars.insert("station", request.station.clone());
    vars.insert("latitude", request.latitude.to_string());
    vars.insert("longitude", request.longitude.to_string());
    vars.insert("start", request.start.format(REQUEST_TIME_FORMAT).to_string());
    vars.insert("end", request.end.format(REQUEST_TIME_FORMAT).to_string());
    vars
}

impl ReferenceDownloader for ExternalTool {
    fn download(
        &self,
        request: &ReferenceRequest,
        target_dir: &Path,
        _progress: &dyn ProgressSink,
    ) -> Result<()> {
        let mut vars = request_vars(request);
        vars.insert("output", path_var(target_dir));
        self.run(&vars)?;
        Ok(())
    }
}

impl GridFormatConverter for ExternalTool {
    fn convert(&self, source_dir: &Path, target: &Path) -> Result<()> {
        let mut vars = ToolVars::new();
        vars.insert("input", path_var(source_dir));
        vars.insert("output", path_var(target));
        self.run(&vars)?;
        Ok(())
    }
}

impl GridCropper for ExternalTool {
    fn crop(&self, request: &ReferenceRequest, source: &Path, target: &Path) -> Result<()> {
        let mut vars = request_vars(request);
        vars.insert("input", path_var(source));
        vars.insert("output", path_var(target));
        self.run(&vars)?;
        Ok(())
    }
}

/// Downloader serving files fetched ahead of time into a local directory
#[derive(Debug, Clone)]
pub struct LocalArchive {
    source_dir: PathBuf,
}

impl LocalArchive {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }
}

impl ReferenceDownloader for LocalArchive {
    fn download(
        &self,
        request: &ReferenceRequest,
        target_dir: &Path,
        _progress: &dyn ProgressSink,
    ) -> Result<()> {
        if !self.source_dir.is_dir() {
            return Err(PipelineError::missing_input(&self.source_dir, "Reference archive"));
        }

        let mut copied = 0;
        for entry in fs::read_dir(&self.source_dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().filter(|_| path.is_file()) {
                fs::copy(&path, target_dir.join(name))?;
                copied += 1;
            }
        }

        if copied == 0 {
            return Err(PipelineError::MissingData(format!(
                "Reference archive {} is empty",
                self.source_dir.display()
            )));
        }

        tracing::info!(station = %request.station, files = copied, "copied archived reference files");
        Ok(())
    }
}

/// Converter and cropper for data that is already unified and cropped
#[derive(Debug, Clone, Copy, Default)]
pub struct PreparedData;

impl GridFormatConverter for PreparedData {
    fn convert(&self, source_dir: &Path, target: &Path) -> Result<()> {
        let mut files = fs::read_dir(source_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.retain(|p| p.is_file());

        match files.as_slice() {
            [single] => {
                fs::copy(single, target)?;
                Ok(())
            }
            [] => Err(PipelineError::MissingData(
                "No reference files were downloaded".to_string(),
            )),
            _ => Err(PipelineError::InvalidFormat(format!(
                "Expected one prepared reference file, found {}",
                files.len()
            ))),
        }
    }
}

impl GridCropper for PreparedData {
    fn crop(&self, _request: &ReferenceRequest, source: &Path, target: &Path) -> Result<()> {
        fs::copy(source, target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::NoProgress;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn request() -> ReferenceRequest {
        let day = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        ReferenceRequest {
            station: "Karlsruhe".to_string(),
            latitude: 49.0,
            longitude: 8.4,
            start: day.and_hms_opt(0, 0, 0).unwrap(),
            end: day.and_hms_opt(23, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_placeholder_substitution() {
        let tool = ExternalTool::new("cdo", &["-sellonlatbox,{longitude}", "{input}", "{output}", "{unknown}"]);
        let mut vars = request_vars(&request());
        vars.insert("input", "in.nc".to_string());
        vars.insert("output", "out.nc".to_string());

        assert_eq!(
            tool.render_args(&vars),
            vec!["-sellonlatbox,8.4", "in.nc", "out.nc", "{unknown}"]
        );
        assert_eq!(vars["start"], "2023-07-01T00:00:00");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output_and_failure() {
        let mut vars = ToolVars::new();
        vars.insert("word", "hello".to_string());

        let echo = ExternalTool::new("echo", &["{word}"]);
        assert_eq!(echo.run(&vars).unwrap().trim(), "hello");

        let failing = ExternalTool::new("false", &[]);
        assert!(matches!(failing.run(&vars), Err(PipelineError::Tool { .. })));
    }

    #[test]
    fn test_missing_program() {
        let tool = ExternalTool::new("station-twin-no-such-program", &[]);
        assert!(matches!(tool.run(&ToolVars::new()), Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_local_archive_copies_files() -> Result<()> {
        let source = TempDir::new()?;
        let target = TempDir::new()?;
        fs::write(source.path().join("2023_07.grib"), b"grib")?;

        LocalArchive::new(source.path()).download(&request(), target.path(), &NoProgress)?;
        assert!(target.path().join("2023_07.grib").exists());

        let empty = TempDir::new()?;
        let result = LocalArchive::new(empty.path()).download(&request(), target.path(), &NoProgress);
        assert!(matches!(result, Err(PipelineError::MissingData(_))));

        let result = LocalArchive::new("/nonexistent/archive").download(&request(), target.path(), &NoProgress);
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
        Ok(())
    }

    #[test]
    fn test_prepared_data_requires_single_file() -> Result<()> {
        let source = TempDir::new()?;
        let target = source.path().join("unified.nc");

        assert!(matches!(
            PreparedData.convert(source.path(), &target),
            Err(PipelineError::MissingData(_))
        ));

        let raw = TempDir::new()?;
        fs::write(raw.path().join("era5.nc"), b"nc")?;
        PreparedData.convert(raw.path(), &target)?;
        assert_eq!(fs::read(&target)?, b"nc");
        Ok(())
    }
}
