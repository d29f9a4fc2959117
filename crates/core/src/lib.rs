mod apply;
mod backup;
mod config;
mod exif_reader;
mod exiftool;
mod grouping;
mod inventory;
mod media;
mod naming;
mod pipeline;
mod planner;
mod sidecar;
mod summary;
mod timestamp;
mod tool;
mod warning;
mod xmp_sidecar;

#[cfg(test)]
mod test_support;

pub use apply::{apply_plan, undo_journal, ApplyResult, RenameOperation, RunJournal, UndoResult};
pub use backup::{create_snapshot, BackupOutcome, BackupProgress, BackupSnapshot};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use exiftool::ExifTool;
pub use grouping::{
    extract_timestamps, group_by_timestamp, Extraction, TimestampGroup, TimestampIndex,
};
pub use inventory::{
    default_extensions, scan_inventory, Inventory, InventoryError, InventoryStats, ScanOptions,
    BACKUP_DIR_PREFIX,
};
pub use media::MediaFile;
pub use naming::{NamingError, NamingTemplate, MAX_EVENT_LEN};
pub use pipeline::{run, RunOptions, RunReport};
pub use planner::{plan_renames, RenameCandidate, RenamePlan, RenameStats};
pub use sidecar::{
    reconcile_sidecars, IdentitySource, ReconcileOutcome, Resolution, SidecarMode, SidecarRecord,
};
pub use summary::RunSummary;
pub use timestamp::{Timestamp, MISSING_TIMESTAMP_PLACEHOLDER};
pub use tool::{select_tool, MetadataTool, NativeTool, ToolKind};
pub use warning::{RunWarning, WarningKind};
pub use xmp_sidecar::{read_sidecar_original, sidecar_path_for};
