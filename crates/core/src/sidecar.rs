use crate::apply::RunJournal;
use crate::backup::{create_backup_root, relocate_into_backup};
use crate::grouping::{IndexMatch, TimestampIndex};
use crate::inventory::{walk_files, InventoryStats};
use crate::media::{file_name_lossy, normalized_extension};
use crate::timestamp::Timestamp;
use crate::tool::MetadataTool;
use crate::warning::{RunWarning, WarningKind};
use crate::xmp_sidecar::{is_sidecar, original_title, sidecar_path_for};
use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What happens to sidecars that exist before this run writes its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SidecarMode {
    /// Move them into the backup folder, then write.
    #[default]
    Backup,
    /// Leave them; write nothing where one already exists.
    Skip,
    /// Delete them, then write.
    Overwrite,
}

impl FromStr for SidecarMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backup" => Ok(Self::Backup),
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            other => bail!(
                "invalid sidecar mode '{}' (expected backup|skip|overwrite)",
                other
            ),
        }
    }
}

impl fmt::Display for SidecarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Backup => "backup",
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
        })
    }
}

/// Where the original file name of a renamed file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentitySource {
    /// The run journal, keyed by assigned target path. Files without a
    /// capture time still get their pre-rename name, with no fallback warning.
    #[default]
    Journal,
    /// Re-read capture time and join on timestamp + extension.
    CaptureTime,
}

impl FromStr for IdentitySource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "journal" => Ok(Self::Journal),
            "capture-time" | "capture_time" => Ok(Self::CaptureTime),
            other => bail!(
                "invalid identity source '{}' (expected journal|capture-time)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Journal,
    ExactExtension,
    AnyExtension,
    CurrentName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarRecord {
    pub target_file: PathBuf,
    pub sidecar: PathBuf,
    pub original_filename: String,
    pub mode: SidecarMode,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub mode: SidecarMode,
    pub identity: IdentitySource,
    pub recursive: bool,
}

pub struct ReconcileContext<'a> {
    pub root: &'a Path,
    pub index: &'a TimestampIndex,
    pub journal: &'a RunJournal,
    /// Snapshot folder of this run, if one was taken.
    pub backup_root: Option<&'a Path>,
    pub started_at: DateTime<Local>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub records: Vec<SidecarRecord>,
    pub skipped: usize,
    pub relocated: usize,
    pub removed: usize,
    /// Set when backup mode had to create its own backup folder.
    pub created_backup_root: Option<PathBuf>,
    pub warnings: Vec<RunWarning>,
}

/// Writes `Original: <name>` sidecars for every file in the journal after the
/// pre-existing sidecars in scope are dealt with per `options.mode`.
/// Per-file failures are warnings; only setup failures are errors.
pub fn reconcile_sidecars(
    ctx: &ReconcileContext<'_>,
    options: &ReconcileOptions,
    tool: &dyn MetadataTool,
) -> Result<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();
    let existing = existing_sidecars(ctx.root, options.recursive)?;

    match options.mode {
        SidecarMode::Backup if !existing.is_empty() => {
            let backup_root = match ctx.backup_root {
                Some(path) => path.to_path_buf(),
                None => {
                    let created = create_backup_root(ctx.root, &ctx.started_at)?;
                    outcome.created_backup_root = Some(created.clone());
                    created
                }
            };
            for sidecar in &existing {
                match relocate_into_backup(&backup_root, ctx.root, sidecar) {
                    Ok(_) => outcome.relocated += 1,
                    Err(err) => outcome.warnings.push(RunWarning::new(
                        WarningKind::SidecarRelocateFailed,
                        sidecar,
                        format!("{:#}", err),
                    )),
                }
            }
        }
        SidecarMode::Overwrite => {
            for sidecar in &existing {
                match fs::remove_file(sidecar) {
                    Ok(()) => outcome.removed += 1,
                    Err(err) => outcome.warnings.push(RunWarning::new(
                        WarningKind::SidecarRemoveFailed,
                        sidecar,
                        err.to_string(),
                    )),
                }
            }
        }
        SidecarMode::Backup | SidecarMode::Skip => {}
    }

    for target in ctx.journal.targets() {
        let sidecar = sidecar_path_for(target);
        if options.mode == SidecarMode::Skip && sidecar.exists() {
            log::debug!("keeping existing sidecar {}", sidecar.display());
            outcome.skipped += 1;
            continue;
        }

        let (original, resolution) =
            resolve_original(ctx, options.identity, tool, target, &mut outcome.warnings);

        match tool.write_sidecar(target, &sidecar, &original_title(&original)) {
            Ok(()) => outcome.records.push(SidecarRecord {
                target_file: target.to_path_buf(),
                sidecar,
                original_filename: original,
                mode: options.mode,
                resolution,
            }),
            Err(err) => outcome.warnings.push(RunWarning::new(
                WarningKind::SidecarWriteFailed,
                target,
                format!("{:#}", err),
            )),
        }
    }

    log::info!(
        "sidecars: {} written, {} skipped, {} relocated, {} removed",
        outcome.records.len(),
        outcome.skipped,
        outcome.relocated,
        outcome.removed
    );
    Ok(outcome)
}

fn resolve_original(
    ctx: &ReconcileContext<'_>,
    identity: IdentitySource,
    tool: &dyn MetadataTool,
    target: &Path,
    warnings: &mut Vec<RunWarning>,
) -> (String, Resolution) {
    if identity == IdentitySource::Journal {
        if let Some(from) = ctx.journal.original_for(target) {
            return (file_name_lossy(from), Resolution::Journal);
        }
    }

    let extension = normalized_extension(target).unwrap_or_default();
    let timestamp = match tool.read_capture_time(target) {
        Ok(raw) => raw.as_deref().and_then(Timestamp::parse),
        Err(err) => {
            log::debug!("capture time unreadable for {}: {:#}", target.display(), err);
            None
        }
    };

    if let Some(ts) = timestamp {
        if let Some((name, matched)) = ctx.index.resolve(&ts, &extension) {
            let resolution = match matched {
                IndexMatch::ExactExtension => Resolution::ExactExtension,
                IndexMatch::AnyExtension => Resolution::AnyExtension,
            };
            return (name.to_string(), resolution);
        }
    }

    let current = file_name_lossy(target);
    warnings.push(RunWarning::new(
        WarningKind::ReconcileFallback,
        target,
        format!("no original name found, recording current name '{}'", current),
    ));
    (current, Resolution::CurrentName)
}

fn existing_sidecars(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut stats = InventoryStats::default();
    Ok(walk_files(root, recursive, &mut stats)?
        .into_iter()
        .filter(|path| is_sidecar(path))
        .collect())
}
