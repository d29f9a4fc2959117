use crate::apply::{apply_plan, RunJournal};
use crate::backup::{create_snapshot, BackupProgress, BackupSnapshot};
use crate::grouping::extract_timestamps;
use crate::inventory::{scan_inventory, InventoryStats, ScanOptions};
use crate::naming::NamingTemplate;
use crate::planner::{plan_renames, RenamePlan};
use crate::sidecar::{
    reconcile_sidecars, IdentitySource, ReconcileContext, ReconcileOptions, SidecarMode,
    SidecarRecord,
};
use crate::summary::RunSummary;
use crate::tool::MetadataTool;
use crate::warning::RunWarning;
use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub recursive: bool,
    pub extensions: Vec<String>,
    pub category: Option<String>,
    pub event: String,
    pub backup: bool,
    pub sidecars: bool,
    pub sidecar_mode: SidecarMode,
    pub identity: IdentitySource,
    pub dry_run: bool,
    /// Where to persist the run journal for `undo`. Not persisted when `None`.
    pub journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub inventory: InventoryStats,
    pub plan: RenamePlan,
    pub backup: Option<BackupSnapshot>,
    pub journal: Option<RunJournal>,
    pub sidecars: Vec<SidecarRecord>,
    pub warnings: Vec<RunWarning>,
    pub summary: RunSummary,
    pub dry_run: bool,
}

/// scan -> extract -> plan -> backup -> rename -> sidecars -> summary.
///
/// Naming arguments are validated before the folder is touched. The backup
/// completes before the first rename, and the timestamp index is taken before
/// either, so it only ever holds pre-rename names.
pub fn run<F>(options: &RunOptions, tool: &dyn MetadataTool, progress: F) -> Result<RunReport>
where
    F: Fn(BackupProgress) + Sync,
{
    let started_at = Local::now();
    let template = NamingTemplate::new(options.category.as_deref(), &options.event)?;

    let inventory = scan_inventory(&ScanOptions {
        root: options.root.clone(),
        recursive: options.recursive,
        extensions: options.extensions.clone(),
    })?;
    let root = inventory.root.clone();

    let extraction = extract_timestamps(inventory.files, tool);
    let mut warnings = extraction.warnings;
    let plan = plan_renames(&root, &extraction.files, &template)?;

    if options.dry_run {
        let summary =
            RunSummary::collect(&inventory.stats, &plan.stats, None, None, None, &warnings);
        return Ok(RunReport {
            inventory: inventory.stats,
            plan,
            backup: None,
            journal: None,
            sidecars: Vec::new(),
            warnings,
            summary,
            dry_run: true,
        });
    }

    let backup = if options.backup {
        let outcome = create_snapshot(&root, &extraction.files, started_at, progress)?;
        warnings.extend(outcome.warnings);
        Some(outcome.snapshot)
    } else {
        None
    };

    let applied = apply_plan(&plan, tool)?;
    let mut journal = applied.journal.clone();
    journal.backup_root = backup.as_ref().map(|b| b.backup_root.clone());
    if let Some(path) = &options.journal_path {
        journal.save(path)?;
    }

    let reconciled = if options.sidecars {
        let ctx = ReconcileContext {
            root: &root,
            index: &extraction.index,
            journal: &journal,
            backup_root: backup.as_ref().map(|b| b.backup_root.as_path()),
            started_at,
        };
        let reconcile_options = ReconcileOptions {
            mode: options.sidecar_mode,
            identity: options.identity,
            recursive: options.recursive,
        };
        Some(reconcile_sidecars(&ctx, &reconcile_options, tool)?)
    } else {
        None
    };

    let mut sidecars = Vec::new();
    if let Some(outcome) = &reconciled {
        warnings.extend(outcome.warnings.iter().cloned());
        sidecars = outcome.records.clone();
        journal.sidecars = sidecars.iter().map(|r| r.sidecar.clone()).collect();
        if journal.backup_root.is_none() {
            journal.backup_root = outcome.created_backup_root.clone();
        }
        if let Some(path) = &options.journal_path {
            journal.save(path)?;
        }
    }

    let summary = RunSummary::collect(
        &inventory.stats,
        &plan.stats,
        Some(&applied),
        backup.as_ref(),
        reconciled.as_ref(),
        &warnings,
    );
    log::info!(
        "done: {} renamed, {} sidecars, {} warnings",
        summary.renamed,
        summary.sidecars_written,
        summary.warnings
    );

    Ok(RunReport {
        inventory: inventory.stats,
        plan,
        backup,
        journal: Some(journal),
        sidecars,
        warnings,
        summary,
        dry_run: false,
    })
}
