use crate::planner::{RenameCandidate, RenamePlan};
use crate::tool::MetadataTool;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const TEMP_PREFIX: &str = ".crn_tmp_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOperation {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// What one run did, keyed by assigned target path. Lets the sidecar pass
/// recover the original name without re-deriving it from capture time, and
/// lets `undo` walk the run back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunJournal {
    pub root: PathBuf,
    #[serde(default)]
    pub backup_root: Option<PathBuf>,
    /// Every planned file, including those whose name did not change.
    pub operations: Vec<RenameOperation>,
    #[serde(default)]
    pub sidecars: Vec<PathBuf>,
}

impl RunJournal {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Original path of the file now living at `target`.
    pub fn original_for(&self, target: &Path) -> Option<&Path> {
        self.operations
            .iter()
            .find(|op| op.to == target)
            .map(|op| op.from.as_path())
    }

    pub fn targets(&self) -> impl Iterator<Item = &Path> {
        self.operations.iter().map(|op| op.to.as_path())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create journal folder: {}", parent.display())
            })?;
        }
        let body = serde_json::to_string_pretty(self).context("failed to serialize journal")?;
        fs::write(path, body)
            .with_context(|| format!("failed to write journal: {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read journal: {}", path.display()))?;
        serde_json::from_str(&raw).context("journal is corrupt")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub journal: RunJournal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoResult {
    pub restored: usize,
    pub sidecars_removed: usize,
}

#[derive(Debug, Clone)]
struct StagedRename {
    original_path: PathBuf,
    target_path: PathBuf,
    temp_path: PathBuf,
}

/// Applies every changed candidate through `tool`. Renames go original -> temp
/// -> target so a plan may reuse names other members are vacating; if any step
/// fails the completed steps are reversed before the error is returned.
pub fn apply_plan(plan: &RenamePlan, tool: &dyn MetadataTool) -> Result<ApplyResult> {
    let mut journal = RunJournal::new(&plan.root);
    journal.operations = plan
        .candidates
        .iter()
        .map(|c| RenameOperation {
            from: c.original_path.clone(),
            to: c.target_path.clone(),
        })
        .collect();

    let candidates: Vec<&RenameCandidate> = plan.candidates.iter().filter(|c| c.changed).collect();
    if candidates.is_empty() {
        return Ok(ApplyResult {
            applied: 0,
            unchanged: plan.candidates.len(),
            journal,
        });
    }

    validate_apply_candidates(plan, &candidates)?;

    let mut staged = Vec::<StagedRename>::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let entry = StagedRename {
            original_path: candidate.original_path.clone(),
            target_path: candidate.target_path.clone(),
            temp_path: temp_path_for(&candidate.original_path, index),
        };
        if let Err(err) = tool.rename_file(&entry.original_path, &entry.temp_path) {
            let stage_err = err.context(format!(
                "failed to stage rename: {} -> {}",
                entry.original_path.display(),
                entry.temp_path.display()
            ));
            if let Err(rollback_err) = roll_back(&staged, 0) {
                return Err(stage_err.context(format!(
                    "rollback after failed staging also failed: {rollback_err:#}"
                )));
            }
            return Err(stage_err);
        }
        staged.push(entry);
    }

    for (finalized, entry) in staged.iter().enumerate() {
        if let Err(err) = tool.rename_file(&entry.temp_path, &entry.target_path) {
            let apply_err = err.context(format!(
                "failed to finalize rename: {} -> {}",
                entry.temp_path.display(),
                entry.target_path.display()
            ));
            if let Err(rollback_err) = roll_back(&staged, finalized) {
                return Err(apply_err.context(format!(
                    "rollback after failed rename also failed: {rollback_err:#}"
                )));
            }
            return Err(apply_err);
        }
        log::debug!(
            "renamed {} -> {}",
            entry.original_path.display(),
            entry.target_path.display()
        );
    }

    Ok(ApplyResult {
        applied: staged.len(),
        unchanged: plan.candidates.len().saturating_sub(staged.len()),
        journal,
    })
}

/// Rejects plans that would leave the root, touch one file twice, or land two
/// files on one name. Nothing has been mutated when this fails.
fn validate_apply_candidates(plan: &RenamePlan, candidates: &[&RenameCandidate]) -> Result<()> {
    let root = fs::canonicalize(&plan.root)
        .with_context(|| format!("failed to resolve root: {}", plan.root.display()))?;
    let mut seen_original_paths = HashSet::<PathBuf>::new();
    let mut seen_target_paths = HashSet::<PathBuf>::new();

    for candidate in candidates {
        let original_canonical = fs::canonicalize(&candidate.original_path).with_context(|| {
            format!(
                "failed to resolve source file: {}",
                candidate.original_path.display()
            )
        })?;
        if !original_canonical.starts_with(&root) {
            bail!(
                "source file is outside the root: {}",
                candidate.original_path.display()
            );
        }
        seen_original_paths.insert(original_canonical);
    }
    if seen_original_paths.len() != candidates.len() {
        bail!("plan lists the same source file more than once");
    }

    for candidate in candidates {
        let target_parent = candidate.target_path.parent().with_context(|| {
            format!(
                "rename target has no parent folder: {}",
                candidate.target_path.display()
            )
        })?;
        let target_name = candidate.target_path.file_name().with_context(|| {
            format!(
                "rename target has no file name: {}",
                candidate.target_path.display()
            )
        })?;
        let target_parent_canonical = fs::canonicalize(target_parent).with_context(|| {
            format!(
                "failed to resolve target folder: {}",
                target_parent.display()
            )
        })?;
        if !target_parent_canonical.starts_with(&root) {
            bail!(
                "rename target is outside the root: {}",
                candidate.target_path.display()
            );
        }
        let normalized_target = target_parent_canonical.join(target_name);
        if normalized_target.exists() && !seen_original_paths.contains(&normalized_target) {
            bail!(
                "rename target already exists and is not part of this run: {}",
                candidate.target_path.display()
            );
        }
        if !seen_target_paths.insert(normalized_target) {
            bail!(
                "two files would be renamed to the same name: {}",
                candidate.target_path.display()
            );
        }
    }

    Ok(())
}

/// Walks a partly applied batch back: the first `finalized` entries return
/// from their target to their temp name, then every staged entry returns from
/// temp to its original path.
fn roll_back(staged: &[StagedRename], finalized: usize) -> Result<()> {
    let unstage = staged[..finalized]
        .iter()
        .rev()
        .map(|e| (&e.target_path, &e.temp_path));
    let restore = staged
        .iter()
        .rev()
        .map(|e| (&e.temp_path, &e.original_path));

    for (from, to) in unstage.chain(restore) {
        if from.exists() {
            fs::rename(from, to).with_context(|| {
                format!("rollback failed: {} -> {}", from.display(), to.display())
            })?;
        }
    }
    Ok(())
}

/// Reverses a persisted run: renames newest first, then deletes the sidecars
/// it wrote. The backup snapshot is left alone.
pub fn undo_journal(journal_path: &Path) -> Result<UndoResult> {
    if !journal_path.exists() {
        bail!("nothing to undo: no journal at {}", journal_path.display());
    }
    let journal = RunJournal::load(journal_path)?;

    let sidecars_removed = remove_sidecars(&journal)?;
    let restored = restore_operations(&journal)?;

    fs::remove_file(journal_path)
        .with_context(|| format!("failed to delete journal: {}", journal_path.display()))?;

    Ok(UndoResult {
        restored,
        sidecars_removed,
    })
}

fn restore_operations(journal: &RunJournal) -> Result<usize> {
    let mut restored = 0usize;
    let moving: Vec<&RenameOperation> = journal
        .operations
        .iter()
        .filter(|op| op.from != op.to && op.to.exists())
        .collect();

    // Two hops, like apply, since restored names may still be occupied by
    // files that have not been moved back yet.
    let mut parked = HashMap::<usize, PathBuf>::new();
    for (index, op) in moving.iter().enumerate().rev() {
        let temp = temp_path_for(&op.to, index);
        fs::rename(&op.to, &temp).with_context(|| {
            format!("undo failed: {} -> {}", op.to.display(), temp.display())
        })?;
        parked.insert(index, temp);
    }
    for (index, op) in moving.iter().enumerate().rev() {
        let Some(temp) = parked.get(&index) else {
            continue;
        };
        fs::rename(temp, &op.from).with_context(|| {
            format!("undo failed: {} -> {}", temp.display(), op.from.display())
        })?;
        restored += 1;
    }
    Ok(restored)
}

fn remove_sidecars(journal: &RunJournal) -> Result<usize> {
    let mut removed = 0usize;
    for sidecar in &journal.sidecars {
        if !sidecar.exists() {
            continue;
        }
        fs::remove_file(sidecar)
            .with_context(|| format!("failed to delete sidecar: {}", sidecar.display()))?;
        removed += 1;
    }
    Ok(removed)
}

/// Hidden sibling of `path` that no planned name can collide with.
fn temp_path_for(path: &Path, index: usize) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut name = OsString::from(format!("{TEMP_PREFIX}{stamp}_{index}_"));
    name.push(path.file_name().unwrap_or_else(|| OsStr::new("file")));
    path.with_file_name(name)
}
