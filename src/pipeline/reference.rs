use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ScopedWorkspace;
use crate::error::{PipelineError, Result};
use crate::models::StationLocation;
use crate::utils::constants::{PHASE_CONVERTING, PHASE_CROPPING, REFERENCE_FILE, REFERENCE_TEMP_FILE};
use crate::utils::ProgressSink;

/// Area and period of reference data needed for one station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceRequest {
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReferenceRequest {
    pub fn new(location: &StationLocation, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            station: location.name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            start,
            end,
        }
    }
}

/// Fetches raw reference files covering a request into a directory
pub trait ReferenceDownloader {
    fn download(
        &self,
        request: &ReferenceRequest,
        target_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()>;
}

/// Turns a directory of raw reference files into one gridded dataset file
pub trait GridFormatConverter {
    fn convert(&self, source_dir: &Path, target: &Path) -> Result<()>;
}

/// Cuts a gridded dataset down to the cells around the station
pub trait GridCropper {
    fn crop(&self, request: &ReferenceRequest, source: &Path, target: &Path) -> Result<()>;
}

/// Download, convert and crop reference data into a workspace
pub struct ReferenceAcquisition<'a> {
    downloader: &'a dyn ReferenceDownloader,
    converter: &'a dyn GridFormatConverter,
    cropper: &'a dyn GridCropper,
}

impl<'a> ReferenceAcquisition<'a> {
    pub fn new(
        downloader: &'a dyn ReferenceDownloader,
        converter: &'a dyn GridFormatConverter,
        cropper: &'a dyn GridCropper,
    ) -> Self {
        Self {
            downloader,
            converter,
            cropper,
        }
    }

    /// Returns the path of the cropped dataset inside `workspace`.
    ///
    /// Raw downloads live in their own directory, removed on every exit
    /// path. The unified intermediate file is removed once cropping is done.
    pub fn acquire(
        &self,
        request: &ReferenceRequest,
        workspace: &ScopedWorkspace,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let unified = workspace.join(REFERENCE_TEMP_FILE);
        let target = workspace.join(REFERENCE_FILE);

        {
            let raw = ScopedWorkspace::with_prefix("era5-raw-")?;
            tracing::info!(
                station = %request.station,
                start = %request.start,
                end = %request.end,
                "downloading reference data"
            );
            self.downloader.download(request, raw.path(), progress)?;

            progress.update_phase(PHASE_CONVERTING);
            self.converter.convert(raw.path(), &unified)?;
            raw.close()?;
        }

        progress.update_phase(PHASE_CROPPING);
        let cropped = self.cropper.crop(request, &unified, &target);
        remove_intermediate(&unified)?;
        cropped?;

        if !target.exists() {
            return Err(PipelineError::missing_input(&target, "Cropped reference data"));
        }

        tracing::info!(path = %target.display(), "reference data ready");
        Ok(target)
    }
}

fn remove_intermediate(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::PhaseLog;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    struct FakeDownloader {
        seen_dir: RefCell<Option<PathBuf>>,
    }

    impl ReferenceDownloader for FakeDownloader {
        fn download(&self, _: &ReferenceRequest, target_dir: &Path, _: &dyn ProgressSink) -> Result<()> {
            fs::write(target_dir.join("part_0.grib"), b"grib")?;
            *self.seen_dir.borrow_mut() = Some(target_dir.to_path_buf());
            Ok(())
        }
    }

    struct ConcatConverter;

    impl GridFormatConverter for ConcatConverter {
        fn convert(&self, source_dir: &Path, target: &Path) -> Result<()> {
            let mut bytes = Vec::new();
            for entry in fs::read_dir(source_dir)? {
                bytes.extend(fs::read(entry?.path())?);
            }
            fs::write(target, bytes)?;
            Ok(())
        }
    }

    struct CopyCropper {
        fail: bool,
    }

    impl GridCropper for CopyCropper {
        fn crop(&self, _: &ReferenceRequest, source: &Path, target: &Path) -> Result<()> {
            if self.fail {
                return Err(PipelineError::MissingData("no cells".to_string()));
            }
            fs::copy(source, target)?;
            Ok(())
        }
    }

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
    fn test_acquire_leaves_only_cropped_file() -> Result<()> {
        let workspace = ScopedWorkspace::new()?;
        let downloader = FakeDownloader {
            seen_dir: RefCell::new(None),
        };
        let log = PhaseLog::new();

        let path = ReferenceAcquisition::new(&downloader, &ConcatConverter, &CopyCropper { fail: false })
            .acquire(&request(), &workspace, &log)?;

        assert_eq!(path, workspace.join(REFERENCE_FILE));
        assert_eq!(fs::read(&path)?, b"grib");
        assert!(!workspace.join(REFERENCE_TEMP_FILE).exists());
        assert!(!downloader.seen_dir.borrow().as_ref().unwrap().exists());
        assert_eq!(log.phases(), vec![PHASE_CONVERTING, PHASE_CROPPING]);
        Ok(())
    }

    #[test]
    fn test_crop_failure_still_removes_intermediate() -> Result<()> {
        let workspace = ScopedWorkspace::new()?;
        let downloader = FakeDownloader {
            seen_dir: RefCell::new(None),
        };

        let result = ReferenceAcquisition::new(&downloader, &ConcatConverter, &CopyCropper { fail: true })
            .acquire(&request(), &workspace, &PhaseLog::new());

        assert!(matches!(result, Err(PipelineError::MissingData(_))));
        assert!(!workspace.join(REFERENCE_TEMP_FILE).exists());
        Ok(())
    }
}
