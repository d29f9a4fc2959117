use crate::apply::ApplyResult;
use crate::backup::BackupSnapshot;
use crate::inventory::InventoryStats;
use crate::planner::RenameStats;
use crate::sidecar::ReconcileOutcome;
use crate::warning::{count_kind, RunWarning, WarningKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub eligible: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub missing_timestamp: usize,
    pub duplicate_groups: usize,
    pub duplicate_files: usize,
    pub backed_up: usize,
    pub backup_failures: usize,
    pub sidecars_written: usize,
    pub sidecars_skipped: usize,
    pub sidecars_relocated: usize,
    pub sidecars_removed: usize,
    pub warnings: usize,
}

impl RunSummary {
    pub fn collect(
        inventory: &InventoryStats,
        plan: &RenameStats,
        applied: Option<&ApplyResult>,
        backup: Option<&BackupSnapshot>,
        sidecars: Option<&ReconcileOutcome>,
        warnings: &[RunWarning],
    ) -> Self {
        Self {
            scanned: inventory.scanned_files,
            eligible: inventory.eligible_files,
            renamed: applied.map(|a| a.applied).unwrap_or(0),
            unchanged: applied.map(|a| a.unchanged).unwrap_or(plan.unchanged),
            missing_timestamp: plan.missing_timestamp,
            duplicate_groups: plan.duplicate_groups,
            duplicate_files: plan.duplicate_files,
            backed_up: backup.map(|b| b.copied.len()).unwrap_or(0),
            backup_failures: count_kind(warnings, WarningKind::BackupCopyFailed),
            sidecars_written: sidecars.map(|s| s.records.len()).unwrap_or(0),
            sidecars_skipped: sidecars.map(|s| s.skipped).unwrap_or(0),
            sidecars_relocated: sidecars.map(|s| s.relocated).unwrap_or(0),
            sidecars_removed: sidecars.map(|s| s.removed).unwrap_or(0),
            warnings: warnings.len(),
        }
    }
}
