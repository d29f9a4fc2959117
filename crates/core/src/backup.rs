use crate::inventory::BACKUP_DIR_PREFIX;
use crate::media::MediaFile;
use crate::warning::{RunWarning, WarningKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupProgress {
    pub done: usize,
    pub total: usize,
    pub percent: u8,
}

impl BackupProgress {
    fn new(done: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (done * 100 / total).min(100) as u8
        };
        Self {
            done,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub backup_root: PathBuf,
    pub created_at: DateTime<Local>,
    /// Relative to the scan root, in inventory order.
    pub copied: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub snapshot: BackupSnapshot,
    pub warnings: Vec<RunWarning>,
}

pub fn backup_dir_name(created_at: &DateTime<Local>) -> String {
    format!("{}{}", BACKUP_DIR_PREFIX, created_at.format("%Y%m%d_%H%M%S"))
}

/// Creates `<root>/backup_<YYYYMMDD_HHMMSS>`, with a numeric suffix if a
/// snapshot from the same second already exists.
pub fn create_backup_root(root: &Path, created_at: &DateTime<Local>) -> Result<PathBuf> {
    let backup_root = first_free_path(root.join(backup_dir_name(created_at)));
    fs::create_dir_all(&backup_root).with_context(|| {
        format!(
            "failed to create backup folder: {}",
            backup_root.display()
        )
    })?;
    Ok(backup_root)
}

/// Copies every inventory file into a fresh backup root, mirroring relative
/// paths. A failed copy becomes a warning; the rest still run.
pub fn create_snapshot<F>(
    root: &Path,
    files: &[MediaFile],
    created_at: DateTime<Local>,
    progress: F,
) -> Result<BackupOutcome>
where
    F: Fn(BackupProgress) + Sync,
{
    let backup_root = create_backup_root(root, &created_at)?;
    let total = files.len();

    let jobs: Vec<(PathBuf, PathBuf, PathBuf)> = files
        .iter()
        .map(|file| {
            let relative = relative_or_file_name(root, &file.path);
            let destination = backup_root.join(&relative);
            (file.path.clone(), relative, destination)
        })
        .collect();

    let done = Mutex::new(0usize);
    let results: Vec<std::result::Result<PathBuf, RunWarning>> = jobs
        .par_iter()
        .map(|(source, relative, destination)| {
            let result = copy_one(source, destination)
                .map(|_| relative.clone())
                .map_err(|err| {
                    RunWarning::new(WarningKind::BackupCopyFailed, source, format!("{:#}", err))
                });
            if let Ok(mut done) = done.lock() {
                *done += 1;
                progress(BackupProgress::new(*done, total));
            }
            result
        })
        .collect();

    let mut copied = Vec::with_capacity(total);
    let mut warnings = Vec::new();
    for result in results {
        match result {
            Ok(relative) => copied.push(relative),
            Err(warning) => warnings.push(warning),
        }
    }

    log::info!(
        "backup: {} of {} files copied to {}",
        copied.len(),
        total,
        backup_root.display()
    );

    Ok(BackupOutcome {
        snapshot: BackupSnapshot {
            backup_root,
            created_at,
            copied,
        },
        warnings,
    })
}

/// Moves `path` under `backup_root` at its path relative to `root`. Returns
/// the new location.
pub fn relocate_into_backup(backup_root: &Path, root: &Path, path: &Path) -> Result<PathBuf> {
    let destination = first_free_path(backup_root.join(relative_or_file_name(root, path)));
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create backup subfolder: {}", parent.display())
        })?;
    }
    fs::rename(path, &destination).with_context(|| {
        format!(
            "failed to move into backup: {} -> {}",
            path.display(),
            destination.display()
        )
    })?;
    Ok(destination)
}

fn copy_one(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create backup subfolder: {}", parent.display())
        })?;
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "failed to back up {} -> {}",
            source.display(),
            destination.display()
        )
    })?;
    Ok(())
}

fn relative_or_file_name(root: &Path, path: &Path) -> PathBuf {
    if let Ok(relative) = path.strip_prefix(root) {
        if !relative.as_os_str().is_empty() {
            return relative.to_path_buf();
        }
    }
    PathBuf::from(
        path.file_name()
            .map(|v| v.to_os_string())
            .unwrap_or_else(|| OsString::from("file")),
    )
}

/// `candidate` itself, or its first free `<stem>_NNN[.ext]` sibling.
fn first_free_path(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }
    let stem = candidate
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = candidate.extension().map(|v| v.to_string_lossy().to_string());

    (1usize..)
        .map(|n| match &ext {
            Some(ext) => candidate.with_file_name(format!("{stem}_{n:03}.{ext}")),
            None => candidate.with_file_name(format!("{stem}_{n:03}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 9, 24, 14, 23, 12)
            .single()
            .expect("unambiguous local time")
    }

    fn write(path: &Path, body: &[u8]) -> MediaFile {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, body).expect("write file");
        MediaFile::new(path.to_path_buf())
    }

    #[test]
    fn snapshot_mirrors_relative_tree_byte_for_byte() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let files = vec![
            write(&root.join("a.jpg"), b"AAA"),
            write(&root.join("day1/b.RAF"), b"BBB"),
        ];

        let outcome = create_snapshot(root, &files, fixed_time(), |_| {}).expect("snapshot");
        let backup_root = &outcome.snapshot.backup_root;

        assert_eq!(
            backup_root.file_name().and_then(|v| v.to_str()),
            Some("backup_20240924_142312")
        );
        assert!(outcome.warnings.is_empty());
        for file in &files {
            let relative = file.path.strip_prefix(root).expect("relative");
            let copy = backup_root.join(relative);
            assert_eq!(
                fs::read(&copy).expect("read copy"),
                fs::read(&file.path).expect("read source")
            );
        }
        assert_eq!(outcome.snapshot.copied.len(), 2);
    }

    #[test]
    fn snapshot_reports_missing_source_and_continues() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let files = vec![
            MediaFile::new(root.join("gone.jpg")),
            write(&root.join("here.jpg"), b"H"),
        ];

        let outcome = create_snapshot(root, &files, fixed_time(), |_| {}).expect("snapshot");
        assert_eq!(outcome.snapshot.copied, vec![PathBuf::from("here.jpg")]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::BackupCopyFailed);
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let files: Vec<MediaFile> = (0..7)
            .map(|i| write(&root.join(format!("{i}.jpg")), b"x"))
            .collect();

        let seen = Mutex::new(Vec::new());
        create_snapshot(root, &files, fixed_time(), |p| {
            seen.lock().expect("lock").push(p.percent)
        })
        .expect("snapshot");

        let seen = seen.into_inner().expect("into inner");
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100));
    }

    #[test]
    fn second_backup_in_same_second_gets_suffix() {
        let temp = tempdir().expect("tempdir");
        let first = create_backup_root(temp.path(), &fixed_time()).expect("first");
        let second = create_backup_root(temp.path(), &fixed_time()).expect("second");
        assert_ne!(first, second);
        assert_eq!(
            second.file_name().and_then(|v| v.to_str()),
            Some("backup_20240924_142312_001")
        );
    }

    #[test]
    fn relocate_keeps_relative_path_and_avoids_clobbering() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let backup_root = root.join("backup_x");
        fs::create_dir_all(backup_root.join("day1")).expect("backup dir");
        fs::write(backup_root.join("day1/a.jpg.xmp"), b"old").expect("existing");
        write(&root.join("day1/a.jpg.xmp"), b"new");

        let moved =
            relocate_into_backup(&backup_root, root, &root.join("day1/a.jpg.xmp")).expect("move");
        assert_eq!(moved, backup_root.join("day1/a.jpg_001.xmp"));
        assert_eq!(fs::read(&moved).expect("read"), b"new");
        assert!(!root.join("day1/a.jpg.xmp").exists());
    }
}
