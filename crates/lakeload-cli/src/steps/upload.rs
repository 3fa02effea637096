//! Uploading local files to object storage

use crate::error::{PipelineError, Result};
use crate::policy::StepPolicy;
use crate::providers::ObjectStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// CSV files found in the data directory, sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvFileSet {
    files: Vec<PathBuf>,
}

impl CsvFileSet {
    pub fn from_paths(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Regular files directly under `dir` ending in `.csv`. Not recursive.
pub fn discover_csv_files(dir: &Path) -> Result<CsvFileSet> {
    if !dir.is_dir() {
        return Err(PipelineError::FileNotFound(dir.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }

    Ok(CsvFileSet::from_paths(files))
}

/// `sales.csv` lands at `sales/sales.csv` so each table gets its own prefix;
/// anything else keeps its bare file name.
pub fn object_key(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PipelineError::invalid_input(format!("'{}' has no usable file name", path.display()))
        })?;

    Ok(match file_name.strip_suffix(".csv") {
        Some(stem) if !stem.is_empty() => format!("{}/{}", stem, file_name),
        _ => file_name.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedObject {
    pub bucket: String,
    pub key: String,
    pub path: PathBuf,
}

impl UploadedObject {
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Upload one file under its derived key
pub async fn upload_file(store: &dyn ObjectStore, bucket: &str, path: &Path) -> Result<UploadedObject> {
    let key = object_key(path)?;
    upload_file_as(store, bucket, &key, path).await
}

/// Upload one file under an explicit key
#[instrument(skip(store))]
pub async fn upload_file_as(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: &Path,
) -> Result<UploadedObject> {
    if bucket.trim().is_empty() {
        return Err(PipelineError::invalid_input("bucket name must be non-empty"));
    }
    if !path.is_file() {
        return Err(PipelineError::FileNotFound(path.display().to_string()));
    }

    store.put_file(bucket, key, path).await?;

    let uploaded = UploadedObject {
        bucket: bucket.to_string(),
        key: key.to_string(),
        path: path.to_path_buf(),
    };
    info!(uri = %uploaded.uri(), "Uploaded file");

    Ok(uploaded)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedObject>,
    /// Files skipped under a best-effort policy
    pub failed: Vec<PathBuf>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload every file of the set. Under [`StepPolicy::Fatal`] the first
/// failure stops the step; under best-effort it is recorded and skipped.
pub async fn upload_all(
    store: &dyn ObjectStore,
    policy: StepPolicy,
    bucket: &str,
    files: &CsvFileSet,
) -> Result<UploadReport> {
    let mut report = UploadReport::default();

    for path in files.files() {
        let step = format!("upload of {}", path.display());
        match policy.apply(&step, upload_file(store, bucket, path).await)? {
            Some(uploaded) => report.uploaded.push(uploaded),
            None => report.failed.push(path.clone()),
        }
    }

    if report.is_complete() {
        info!(bucket, files = report.uploaded.len(), "All files uploaded");
    } else {
        warn!(
            bucket,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "Upload finished with skipped files"
        );
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(Path::new("/data/sales.csv")).unwrap(), "sales/sales.csv");
        assert_eq!(object_key(Path::new("script.py")).unwrap(), "script.py");
        assert_eq!(object_key(Path::new(".csv")).unwrap(), ".csv");
    }

    #[test]
    fn test_discover_only_top_level_csv() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sales.csv"), "a\n1\n").unwrap();
        std::fs::write(dir.path().join("category.csv"), "a\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("users.csv"), "a\n").unwrap();

        let set = discover_csv_files(dir.path()).unwrap();
        let names: Vec<_> = set
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["category.csv", "sales.csv"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = discover_csv_files(Path::new("/nonexistent/data")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_uploaded_uri() {
        let obj = UploadedObject {
            bucket: "data-bucket".to_string(),
            key: "sales/sales.csv".to_string(),
            path: PathBuf::from("sales.csv"),
        };
        assert_eq!(obj.uri(), "s3://data-bucket/sales/sales.csv");
    }
}
