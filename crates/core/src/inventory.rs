use crate::media::{normalized_extension, MediaFile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Reserved directory prefix. Anything below a directory carrying it is never
/// treated as live input.
pub const BACKUP_DIR_PREFIX: &str = "backup_";

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "JPG", "JPEG", "RAF", "DNG", "CR2", "CR3", "NEF", "ARW", "ORF", "RW2", "HEIC",
];

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("folder does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("no eligible files found under {}", root.display())]
    NoEligibleFiles { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub recursive: bool,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InventoryStats {
    pub scanned_files: usize,
    pub eligible_files: usize,
    pub skipped_extension: usize,
    pub excluded_backup_dirs: usize,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub root: PathBuf,
    pub files: Vec<MediaFile>,
    pub stats: InventoryStats,
}

/// Lists eligible files in discovery order (sorted by file name per directory).
/// An empty result is an error: nothing downstream can run without a file.
pub fn scan_inventory(options: &ScanOptions) -> Result<Inventory> {
    if !options.root.is_dir() {
        return Err(InventoryError::RootNotFound(options.root.clone()).into());
    }

    let mut stats = InventoryStats::default();
    let allow = normalize_allow_list(&options.extensions);
    let mut files = Vec::new();

    for path in walk_files(&options.root, options.recursive, &mut stats)? {
        stats.scanned_files += 1;
        if is_allowed(&path, &allow) {
            stats.eligible_files += 1;
            files.push(MediaFile::new(path));
        } else {
            stats.skipped_extension += 1;
        }
    }

    if files.is_empty() {
        return Err(InventoryError::NoEligibleFiles {
            root: options.root.clone(),
        }
        .into());
    }

    log::info!(
        "inventory: {} eligible of {} files under {}",
        stats.eligible_files,
        stats.scanned_files,
        options.root.display()
    );

    Ok(Inventory {
        root: options.root.clone(),
        files,
        stats,
    })
}

/// Every regular file in scope, backup directories filtered out by name.
pub(crate) fn walk_files(
    root: &Path,
    recursive: bool,
    stats: &mut InventoryStats,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    if recursive {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() > 0 && is_backup_dir(entry) {
                    stats.excluded_backup_dirs += 1;
                    return false;
                }
                true
            });
        for entry in walker {
            let entry =
                entry.with_context(|| format!("failed to walk folder: {}", root.display()))?;
            if entry.file_type().is_file() {
                out.push(entry.into_path());
            }
        }
    } else {
        let entries = fs::read_dir(root)
            .with_context(|| format!("failed to read folder: {}", root.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in: {}", root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                if is_backup_name(&entry.file_name().to_string_lossy()) {
                    stats.excluded_backup_dirs += 1;
                }
                continue;
            }
            out.push(path);
        }
        out.sort();
    }

    Ok(out)
}

pub fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_DIR_PREFIX)
}

fn is_backup_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && is_backup_name(&entry.file_name().to_string_lossy())
}

fn normalize_allow_list(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_uppercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn is_allowed(path: &Path, allow: &[String]) -> bool {
    normalized_extension(path)
        .map(|ext| allow.iter().any(|a| a == &ext))
        .unwrap_or(false)
}

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|v| v.to_string()).collect()
}
