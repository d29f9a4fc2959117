use crate::timestamp::{Timestamp, MISSING_TIMESTAMP_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_EVENT_LEN: usize = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("event name is empty")]
    EmptyEvent,
    #[error("event name must be 1-{max} characters, got {len}", max = MAX_EVENT_LEN)]
    EventTooLong { len: usize },
    #[error("category is empty")]
    EmptyCategory,
    #[error("'{value}' contains a character not allowed in file names: {ch:?}")]
    InvalidCharacter { value: String, ch: char },
}

/// Validated `{category, event}` pair used to build target file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplate {
    category: Option<String>,
    event: String,
}

impl NamingTemplate {
    pub fn new(category: Option<&str>, event: &str) -> Result<Self, NamingError> {
        let event = event.trim();
        if event.is_empty() {
            return Err(NamingError::EmptyEvent);
        }
        let len = event.chars().count();
        if len > MAX_EVENT_LEN {
            return Err(NamingError::EventTooLong { len });
        }
        check_characters(event)?;

        let category = match category.map(str::trim) {
            Some("") => return Err(NamingError::EmptyCategory),
            Some(value) => {
                check_characters(value)?;
                Some(value.to_string())
            }
            None => None,
        };

        Ok(Self {
            category,
            event: event.to_string(),
        })
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// `_<category>-<event>` or `_<event>`
    pub fn infix(&self) -> String {
        match &self.category {
            Some(category) => format!("_{}-{}", category, self.event),
            None => format!("_{}", self.event),
        }
    }

    /// Full target file name. `ordinal` is `None` for a burst group of one.
    pub fn render(
        &self,
        timestamp: Option<&Timestamp>,
        ordinal: Option<usize>,
        extension: &str,
    ) -> String {
        let base = timestamp
            .map(Timestamp::canonical)
            .unwrap_or_else(|| MISSING_TIMESTAMP_PLACEHOLDER.to_string());
        let suffix = ordinal.map(|n| format!("-{}", n)).unwrap_or_default();
        if extension.is_empty() {
            format!("{}{}{}", base, self.infix(), suffix)
        } else {
            format!("{}{}{}.{}", base, self.infix(), suffix, extension)
        }
    }
}

fn check_characters(value: &str) -> Result<(), NamingError> {
    match value.chars().find(|ch| is_disallowed_char(*ch)) {
        Some(ch) => Err(NamingError::InvalidCharacter {
            value: value.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.')
        || ch == '\0'
        || ch.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> Timestamp {
        Timestamp::parse("2024:09:24 14:23:12").expect("timestamp")
    }

    #[test]
    fn render_with_category_and_no_counter() {
        let template = NamingTemplate::new(Some("fam"), "beach").expect("valid");
        assert_eq!(
            template.render(Some(&ts()), None, "RAF"),
            "2024-09-24_142312_fam-beach.RAF"
        );
    }

    #[test]
    fn render_without_category_with_counter() {
        let template = NamingTemplate::new(None, "beach").expect("valid");
        assert_eq!(
            template.render(Some(&ts()), Some(2), "jpg"),
            "2024-09-24_142312_beach-2.jpg"
        );
    }

    #[test]
    fn render_uses_placeholder_when_timestamp_missing() {
        let template = NamingTemplate::new(Some("fam"), "beach").expect("valid");
        assert_eq!(
            template.render(None, None, "jpg"),
            "0000-00-00_000000_fam-beach.jpg"
        );
    }

    #[test]
    fn event_length_is_bounded() {
        assert!(NamingTemplate::new(None, "twelve_chars").is_ok());
        let err = NamingTemplate::new(None, "thirteen_char").expect_err("must fail");
        assert_eq!(err, NamingError::EventTooLong { len: 13 });
        assert_eq!(
            NamingTemplate::new(None, "  ").expect_err("must fail"),
            NamingError::EmptyEvent
        );
    }

    #[test]
    fn rejects_path_separators_and_empty_category() {
        let err = NamingTemplate::new(None, "a/b").expect_err("must fail");
        assert!(matches!(err, NamingError::InvalidCharacter { ch: '/', .. }));
        assert_eq!(
            NamingTemplate::new(Some(""), "ok").expect_err("must fail"),
            NamingError::EmptyCategory
        );
    }
}
