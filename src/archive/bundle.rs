use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::utils::constants::REPORT_EXTENSIONS;

/// Whether a file belongs in the report bundle
pub fn is_report_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| REPORT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Store every report artifact below `source_dir` flat into `zip_path`.
///
/// Entries are named by file name only; when two files share a name the
/// one visited last wins. Returns the entry names in archive order.
pub fn bundle_directory(source_dir: &Path, zip_path: &Path) -> Result<Vec<String>> {
    let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path == zip_path || !is_report_artifact(path) {
            continue;
        }

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(previous) = entries.insert(name.to_string(), path.to_path_buf()) {
                tracing::warn!(
                    name,
                    replaced = %previous.display(),
                    "duplicate file name in bundle, keeping the last one"
                );
            }
        }
    }

    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in &entries {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;

    tracing::info!(path = %zip_path.display(), files = entries.len(), "wrote report bundle");
    Ok(entries.into_keys().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_only_report_artifacts_are_bundled() -> Result<()> {
        let dir = TempDir::new()?;
        for name in ["a.png", "validation.pdf", "validation.csv", "notes.txt", "era5_for_station.nc"] {
            std::fs::write(dir.path().join(name), name)?;
        }
        let zip_path = dir.path().join("validation.zip");

        let names = bundle_directory(dir.path(), &zip_path)?;

        assert_eq!(names, vec!["a.png", "validation.csv", "validation.pdf"]);
        let archive = ZipArchive::new(File::open(&zip_path)?)?;
        assert_eq!(archive.len(), 3);
        Ok(())
    }

    #[test]
    fn test_nested_files_are_flattened_last_wins() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("nested"))?;
        std::fs::write(dir.path().join("chart.png"), "top")?;
        std::fs::write(dir.path().join("nested").join("chart.png"), "nested")?;
        let zip_path = dir.path().join("validation.zip");

        let names = bundle_directory(dir.path(), &zip_path)?;
        assert_eq!(names, vec!["chart.png"]);

        let mut archive = ZipArchive::new(File::open(&zip_path)?)?;
        let mut content = String::new();
        archive.by_name("chart.png")?.read_to_string(&mut content)?;
        assert_eq!(content, "nested");
        Ok(())
    }

    #[test]
    fn test_rebundling_skips_existing_zip() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("validation.csv"), "x")?;
        let zip_path = dir.path().join("validation.zip");

        bundle_directory(dir.path(), &zip_path)?;
        let names = bundle_directory(dir.path(), &zip_path)?;
        assert_eq!(names, vec!["validation.csv"]);
        Ok(())
    }

    #[test]
    fn test_is_report_artifact() {
        assert!(is_report_artifact(Path::new("/tmp/x/report.pdf")));
        assert!(!is_report_artifact(Path::new("/tmp/x/report.parquet")));
        assert!(!is_report_artifact(Path::new("/tmp/x/README")));
    }
}
