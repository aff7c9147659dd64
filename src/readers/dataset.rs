use std::collections::HashMap;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::GridDataset;

/// Decodes one variable of a gridded dataset file
pub trait DatasetReader {
    fn read_variable(&self, path: &Path, variable: &str) -> Result<GridDataset>;
}

impl<T: DatasetReader + ?Sized> DatasetReader for Box<T> {
    fn read_variable(&self, path: &Path, variable: &str) -> Result<GridDataset> {
        (**self).read_variable(path, variable)
    }
}

impl<T: DatasetReader + ?Sized> DatasetReader for &T {
    fn read_variable(&self, path: &Path, variable: &str) -> Result<GridDataset> {
        (**self).read_variable(path, variable)
    }
}

/// Serves datasets registered by file name.
///
/// The file itself must still exist; only its name is used for the lookup.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReader {
    datasets: HashMap<String, GridDataset>,
}

impl InMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, file_name: impl Into<String>, dataset: GridDataset) -> Self {
        self.insert(file_name, dataset);
        self
    }

    pub fn insert(&mut self, file_name: impl Into<String>, dataset: GridDataset) {
        self.datasets.insert(file_name.into(), dataset);
    }
}

impl DatasetReader for InMemoryReader {
    fn read_variable(&self, path: &Path, variable: &str) -> Result<GridDataset> {
        if !path.exists() {
            return Err(PipelineError::missing_input(path, "Dataset file"));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::InvalidFormat("Invalid dataset path".to_string()))?;

        let dataset = self.datasets.get(file_name).ok_or_else(|| {
            PipelineError::MissingData(format!("No dataset registered for '{}'", file_name))
        })?;

        if dataset.variable() != variable {
            return Err(PipelineError::MissingData(format!(
                "Variable '{}' not found in '{}'",
                variable, file_name
            )));
        }

        Ok(dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array3;
    use tempfile::TempDir;

    fn dataset(variable: &str) -> GridDataset {
        let t = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        GridDataset::new(variable, vec![t], vec![49.0], vec![8.0], Array3::zeros((1, 1, 1))).unwrap()
    }

    #[test]
    fn test_lookup_by_file_name() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("output.nc");
        std::fs::write(&path, b"")?;

        let reader = InMemoryReader::new().with_dataset("output.nc", dataset("tas"));
        let grid = reader.read_variable(&path, "tas")?;
        assert_eq!(grid.variable(), "tas");

        assert!(matches!(
            reader.read_variable(&path, "pr"),
            Err(PipelineError::MissingData(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let reader = InMemoryReader::new().with_dataset("output.nc", dataset("tas"));
        let result = reader.read_variable(Path::new("/nonexistent/output.nc"), "tas");
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
    }
}
