use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const CANONICAL_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Placeholder used in place of the canonical timestamp when a file carries no
/// `DateTimeOriginal`.
pub const MISSING_TIMESTAMP_PLACEHOLDER: &str = "0000-00-00_000000";

/// Capture moment at one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(truncate_subsec(value))
    }

    /// Parses the raw string a metadata tool reports for `DateTimeOriginal`.
    /// Empty or unparseable input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim();
        if normalized.is_empty() {
            return None;
        }

        let candidates = [
            "%Y:%m:%d %H:%M:%S",
            "%Y:%m:%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M:%S%.f",
        ];
        for fmt in candidates {
            if let Ok(naive) = NaiveDateTime::parse_from_str(normalized, fmt) {
                return Some(Self::new(naive));
            }
        }

        // Offsets are dropped: grouping works on the wall clock the camera recorded.
        let zoned = ["%Y:%m:%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];
        for fmt in zoned {
            if let Ok(dt) = DateTime::parse_from_str(normalized, fmt) {
                return Some(Self::new(dt.naive_local()));
            }
        }

        None
    }

    /// `YYYY-MM-DD_HHMMSS`
    pub fn canonical(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn truncate_subsec(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn parses_exif_colon_format() {
        let ts = Timestamp::parse("2024:09:24 14:23:12").expect("must parse");
        assert_eq!(ts.canonical(), "2024-09-24_142312");
    }

    #[test]
    fn sub_second_values_collapse_to_the_same_second() {
        let a = Timestamp::parse("2024:09:24 14:23:12.10").expect("must parse");
        let b = Timestamp::parse("2024:09:24 14:23:12.90").expect("must parse");
        assert_eq!(a, b);
    }

    #[test]
    fn keeps_wall_clock_when_offset_present() {
        let ts = Timestamp::parse("2024-09-24T14:23:12+09:00").expect("must parse");
        assert_eq!(ts.canonical(), "2024-09-24_142312");
    }

    #[test]
    fn empty_and_garbage_are_missing() {
        assert!(Timestamp::parse("").is_none());
        assert!(Timestamp::parse("   ").is_none());
        assert!(Timestamp::parse("0000:00:00 00:00:00").is_none());
        assert!(Timestamp::parse("yesterday").is_none());
    }
}
