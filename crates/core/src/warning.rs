use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    MissingTimestamp,
    BackupCopyFailed,
    SidecarRelocateFailed,
    SidecarRemoveFailed,
    SidecarWriteFailed,
    ReconcileFallback,
}

/// A per-file problem that was reported and stepped over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub kind: WarningKind,
    pub path: PathBuf,
    pub message: String,
}

impl RunWarning {
    /// Logs the warning as it is created.
    pub fn new(kind: WarningKind, path: &Path, message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("{:?}: {}: {}", kind, path.display(), message);
        Self {
            kind,
            path: path.to_path_buf(),
            message,
        }
    }
}

pub fn count_kind(warnings: &[RunWarning], kind: WarningKind) -> usize {
    warnings.iter().filter(|w| w.kind == kind).count()
}
