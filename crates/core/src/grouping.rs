use crate::media::MediaFile;
use crate::timestamp::Timestamp;
use crate::tool::MetadataTool;
use crate::warning::{RunWarning, WarningKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One pre-rename file as the index remembers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub original_name: String,
    pub extension: String,
}

/// `Timestamp -> [(original name, extension)]` in discovery order. Built once
/// before any mutation and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct TimestampIndex {
    entries: BTreeMap<Timestamp, Vec<IndexEntry>>,
}

/// How an original name was recovered from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMatch {
    ExactExtension,
    AnyExtension,
}

impl TimestampIndex {
    pub fn build(files: &[MediaFile]) -> Self {
        let mut entries = BTreeMap::<Timestamp, Vec<IndexEntry>>::new();
        for file in files {
            let Some(ts) = file.capture_timestamp else {
                continue;
            };
            entries.entry(ts).or_default().push(IndexEntry {
                original_name: file.file_name(),
                extension: file.extension.clone(),
            });
        }
        Self { entries }
    }

    /// First entry with the same extension, else the first entry at that
    /// timestamp. With several same-extension entries the first one wins even
    /// if another original was the true source.
    pub fn resolve(&self, timestamp: &Timestamp, extension: &str) -> Option<(&str, IndexMatch)> {
        let entries = self.entries.get(timestamp)?;
        if let Some(entry) = entries
            .iter()
            .find(|e| e.extension.eq_ignore_ascii_case(extension))
        {
            return Some((&entry.original_name, IndexMatch::ExactExtension));
        }
        entries
            .first()
            .map(|e| (e.original_name.as_str(), IndexMatch::AnyExtension))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Files sharing one capture second, across extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampGroup {
    pub timestamp: Timestamp,
    pub files: Vec<MediaFile>,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub files: Vec<MediaFile>,
    pub index: TimestampIndex,
    pub warnings: Vec<RunWarning>,
}

/// Queries every file's capture time. Lookups run in parallel; output keeps
/// the input order, which the burst counters depend on.
pub fn extract_timestamps(files: Vec<MediaFile>, tool: &dyn MetadataTool) -> Extraction {
    let results: Vec<(MediaFile, Option<RunWarning>)> = files
        .into_par_iter()
        .map(|file| match tool.read_capture_time(&file.path) {
            Ok(Some(raw)) => match Timestamp::parse(&raw) {
                Some(ts) => (file.with_timestamp(Some(ts)), None),
                None => {
                    let warning = RunWarning::new(
                        WarningKind::MissingTimestamp,
                        &file.path,
                        format!("unparseable DateTimeOriginal '{}', using fallback name", raw),
                    );
                    (file, Some(warning))
                }
            },
            Ok(None) => {
                let warning = RunWarning::new(
                    WarningKind::MissingTimestamp,
                    &file.path,
                    "no DateTimeOriginal, using fallback name",
                );
                (file, Some(warning))
            }
            Err(err) => {
                let warning = RunWarning::new(
                    WarningKind::MissingTimestamp,
                    &file.path,
                    format!("failed to read DateTimeOriginal, using fallback name: {:#}", err),
                );
                (file, Some(warning))
            }
        })
        .collect();

    let mut out = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (file, warning) in results {
        out.push(file);
        warnings.extend(warning);
    }

    let index = TimestampIndex::build(&out);
    log::debug!("timestamp index holds {} distinct seconds", index.len());
    Extraction {
        files: out,
        index,
        warnings,
    }
}

/// Groups timestamped files by capture second in chronological order; members
/// keep discovery order. Files without a timestamp are left out.
pub fn group_by_timestamp(files: &[MediaFile]) -> Vec<TimestampGroup> {
    let mut groups = BTreeMap::<Timestamp, Vec<MediaFile>>::new();
    for file in files {
        if let Some(ts) = file.capture_timestamp {
            groups.entry(ts).or_default().push(file.clone());
        }
    }
    groups
        .into_iter()
        .map(|(timestamp, files)| TimestampGroup { timestamp, files })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_media, ContentTool};
    use tempfile::tempdir;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).expect("timestamp")
    }

    #[test]
    fn extraction_keeps_order_and_flags_missing_timestamps() {
        let temp = tempdir().expect("tempdir");
        let a = write_media(temp.path(), "a.jpg", "2024:09:24 14:23:12");
        let b = write_media(temp.path(), "b.jpg", "");
        let c = write_media(temp.path(), "c.RAF", "2024:09:24 14:23:12");

        let extraction = extract_timestamps(
            vec![MediaFile::new(a), MediaFile::new(b.clone()), MediaFile::new(c)],
            &ContentTool,
        );

        let names: Vec<String> = extraction.files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.RAF"]);
        assert!(extraction.files[1].capture_timestamp.is_none());
        assert_eq!(extraction.warnings.len(), 1);
        assert_eq!(extraction.warnings[0].kind, WarningKind::MissingTimestamp);
        assert_eq!(extraction.warnings[0].path, b);

        let moment = ts("2024:09:24 14:23:12");
        assert_eq!(extraction.index.len(), 1);
        assert_eq!(
            extraction.index.resolve(&moment, "JPG"),
            Some(("a.jpg", IndexMatch::ExactExtension))
        );
        assert_eq!(
            extraction.index.resolve(&moment, "RAF"),
            Some(("c.RAF", IndexMatch::ExactExtension))
        );
    }

    #[test]
    fn resolve_prefers_exact_extension_then_first_entry() {
        let moment = ts("2024:09:24 14:23:12");
        let files = vec![
            MediaFile::new("/p/DSCF1.JPG".into()).with_timestamp(Some(moment)),
            MediaFile::new("/p/DSCF1.RAF".into()).with_timestamp(Some(moment)),
        ];
        let index = TimestampIndex::build(&files);

        assert_eq!(
            index.resolve(&moment, "RAF"),
            Some(("DSCF1.RAF", IndexMatch::ExactExtension))
        );
        assert_eq!(
            index.resolve(&moment, "DNG"),
            Some(("DSCF1.JPG", IndexMatch::AnyExtension))
        );
        assert_eq!(index.resolve(&ts("2020:01:01 00:00:00"), "JPG"), None);
    }

    #[test]
    fn same_extension_burst_resolves_to_first_member() {
        let moment = ts("2024:09:24 14:23:12");
        let files = vec![
            MediaFile::new("/p/IMG_1.jpg".into()).with_timestamp(Some(moment)),
            MediaFile::new("/p/IMG_2.jpg".into()).with_timestamp(Some(moment)),
        ];
        let index = TimestampIndex::build(&files);
        assert_eq!(
            index.resolve(&moment, "JPG").map(|(name, _)| name),
            Some("IMG_1.jpg")
        );
    }

    #[test]
    fn groups_are_chronological_and_skip_untimed_files() {
        let early = ts("2024:01:01 10:00:00");
        let late = ts("2024:01:01 11:00:00");
        let files = vec![
            MediaFile::new("/p/c.jpg".into()).with_timestamp(Some(late)),
            MediaFile::new("/p/a.jpg".into()).with_timestamp(Some(early)),
            MediaFile::new("/p/x.jpg".into()),
            MediaFile::new("/p/b.raf".into()).with_timestamp(Some(late)),
        ];

        let groups = group_by_timestamp(&files);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].timestamp, early);
        let late_names: Vec<String> = groups[1].files.iter().map(|f| f.file_name()).collect();
        assert_eq!(late_names, vec!["c.jpg", "b.raf"]);
    }
}
