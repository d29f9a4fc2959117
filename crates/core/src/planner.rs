use crate::media::MediaFile;
use crate::naming::NamingTemplate;
use crate::timestamp::Timestamp;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Counter scope: one capture second and one (upper-cased) extension. A RAW and
/// a JPEG from the same shutter event sit in different scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BurstKey {
    pub timestamp: Option<Timestamp>,
    pub extension: String,
}

impl BurstKey {
    pub fn of(file: &MediaFile) -> Self {
        Self {
            timestamp: file.capture_timestamp,
            extension: file.extension.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BurstSlot {
    size: usize,
    issued: usize,
}

/// Per-scope counter state for one planning pass.
#[derive(Debug, Default)]
pub struct BurstCounters {
    slots: HashMap<BurstKey, BurstSlot>,
}

impl BurstCounters {
    /// Sizes every scope up front so the first member already knows whether it
    /// needs a suffix.
    pub fn tally(files: &[MediaFile]) -> Self {
        let mut slots = HashMap::<BurstKey, BurstSlot>::new();
        for file in files {
            slots.entry(BurstKey::of(file)).or_default().size += 1;
        }
        Self { slots }
    }

    /// Next 1-based ordinal, or `None` when the scope holds a single file.
    pub fn next_ordinal(&mut self, key: &BurstKey) -> Option<usize> {
        let slot = self.slots.entry(key.clone()).or_default();
        slot.issued += 1;
        if slot.size > 1 {
            Some(slot.issued)
        } else {
            None
        }
    }

    /// `(groups, files)` over timestamped scopes holding more than one file.
    pub fn duplicates(&self) -> (usize, usize) {
        self.slots
            .iter()
            .filter(|(key, slot)| key.timestamp.is_some() && slot.size > 1)
            .fold((0, 0), |(groups, files), (_, slot)| (groups + 1, files + slot.size))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub timestamp: Option<Timestamp>,
    pub extension: String,
    pub ordinal: Option<usize>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub planned: usize,
    pub unchanged: usize,
    pub missing_timestamp: usize,
    pub duplicate_groups: usize,
    pub duplicate_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub template: NamingTemplate,
    pub candidates: Vec<RenameCandidate>,
    pub stats: RenameStats,
}

/// Computes a target name for every file, in discovery order.
///
/// `<timestamp>_[<category>-]<event>[-<n>].<ext>` where `n` counts within the
/// file's [`BurstKey`] scope. Files without a timestamp use the placeholder
/// timestamp and still get counters among themselves.
pub fn plan_renames(
    root: &Path,
    files: &[MediaFile],
    template: &NamingTemplate,
) -> Result<RenamePlan> {
    let mut counters = BurstCounters::tally(files);
    let mut stats = RenameStats::default();
    let mut candidates = Vec::with_capacity(files.len());

    for file in files {
        let key = BurstKey::of(file);
        let ordinal = counters.next_ordinal(&key);
        let name = template.render(
            file.capture_timestamp.as_ref(),
            ordinal,
            &file.raw_extension(),
        );
        let parent = file
            .path
            .parent()
            .with_context(|| format!("file has no parent folder: {}", file.path.display()))?;
        let target_path = parent.join(name);
        let changed = target_path != file.path;

        stats.planned += 1;
        if !changed {
            stats.unchanged += 1;
        }
        if file.capture_timestamp.is_none() {
            stats.missing_timestamp += 1;
        }

        candidates.push(RenameCandidate {
            original_path: file.path.clone(),
            target_path,
            timestamp: file.capture_timestamp,
            extension: file.extension.clone(),
            ordinal,
            changed,
        });
    }

    let (duplicate_groups, duplicate_files) = counters.duplicates();
    stats.duplicate_groups = duplicate_groups;
    stats.duplicate_files = duplicate_files;

    Ok(RenamePlan {
        root: root.to_path_buf(),
        template: template.clone(),
        candidates,
        stats,
    })
}
