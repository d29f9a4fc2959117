use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Upper-case, without the dot. Grouping key only; target names keep the
    /// extension as spelled on disk.
    pub extension: String,
    pub capture_timestamp: Option<Timestamp>,
}

impl MediaFile {
    pub fn new(path: PathBuf) -> Self {
        let extension = normalized_extension(&path).unwrap_or_default();
        Self {
            path,
            extension,
            capture_timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.capture_timestamp = timestamp;
        self
    }

    pub fn file_name(&self) -> String {
        file_name_lossy(&self.path)
    }

    pub fn raw_extension(&self) -> String {
        self.path
            .extension()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|v| v.to_string_lossy().to_ascii_uppercase())
        .filter(|v| !v.is_empty())
}

pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default()
}
