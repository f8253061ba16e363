use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::OrganizerError;

pub const DELIMITER: char = '_';
pub const DEFAULT_SCAN_ID: &str = "1";

/// Composite `(subject, scan)` key shared by the staging layout, the output
/// layout and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubjectKey {
    subject_id: String,
    scan_id: String,
}

impl SubjectKey {
    pub fn new(subject_id: impl Into<String>, scan_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            scan_id: scan_id.into(),
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Ledger only tells a baseline scan apart from any follow-up.
    pub fn normalized(&self) -> Self {
        let scan_id = if self.scan_id == DEFAULT_SCAN_ID {
            DEFAULT_SCAN_ID
        } else {
            "2"
        };
        Self::new(self.subject_id.clone(), scan_id)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DELIMITER}{}", self.subject_id, self.scan_id)
    }
}

impl FromStr for SubjectKey {
    type Err = OrganizerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match parse_subject_folder(value) {
            ParseResult::Parsed(key) => Ok(key),
            ParseResult::Malformed { raw } => Err(OrganizerError::MalformedIdentifier(raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Parsed(SubjectKey),
    Malformed { raw: String },
}

impl ParseResult {
    fn from_parts(raw: &str, subject_id: &str, scan_id: &str) -> Self {
        if subject_id.is_empty() || scan_id.is_empty() {
            return ParseResult::Malformed {
                raw: raw.to_string(),
            };
        }
        ParseResult::Parsed(SubjectKey::new(subject_id, scan_id))
    }
}

/// Parses an acquisition folder as delivered by the scanner, e.g.
/// `R2D3_SP000_2`. The leading segment is a study prefix; a name without any
/// delimiter is taken as the subject itself.
pub fn parse_raw_folder(raw: &str) -> ParseResult {
    let parts = raw.split(DELIMITER).collect::<Vec<_>>();
    match parts.as_slice() {
        [subject] => ParseResult::from_parts(raw, subject, DEFAULT_SCAN_ID),
        [_, subject] => ParseResult::from_parts(raw, subject, DEFAULT_SCAN_ID),
        [_, subject, scan, ..] => ParseResult::from_parts(raw, subject, scan),
        [] => ParseResult::Malformed {
            raw: raw.to_string(),
        },
    }
}

/// Parses a staging folder written by the conversion gate (`SP000_1`).
/// Unlike [`parse_raw_folder`] the delimiter is mandatory.
pub fn parse_subject_folder(name: &str) -> ParseResult {
    match name.rsplit_once(DELIMITER) {
        Some((subject, scan)) => ParseResult::from_parts(name, subject, scan),
        None => ParseResult::Malformed {
            raw: name.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn raw_folder_with_scan_suffix() {
        let parsed = parse_raw_folder("R2D3_SP000_2");
        assert_eq!(parsed, ParseResult::Parsed(SubjectKey::new("SP000", "2")));
    }

    #[test]
    fn raw_folder_extra_segments_ignored() {
        let parsed = parse_raw_folder("R2D3_SP000_3_repeat");
        assert_eq!(parsed, ParseResult::Parsed(SubjectKey::new("SP000", "3")));
    }

    #[test]
    fn raw_folder_without_delimiter_falls_back() {
        let parsed = parse_raw_folder("SP000");
        assert_eq!(parsed, ParseResult::Parsed(SubjectKey::new("SP000", "1")));
    }

    #[test]
    fn raw_folder_empty_subject_is_malformed() {
        assert_matches!(parse_raw_folder("R2D3_"), ParseResult::Malformed { .. });
        assert_matches!(parse_raw_folder(""), ParseResult::Malformed { .. });
        assert_matches!(parse_raw_folder("R2D3_SP000_"), ParseResult::Malformed { .. });
    }

    #[test]
    fn subject_folder_requires_delimiter() {
        assert_matches!(
            parse_subject_folder("SP000"),
            ParseResult::Malformed { raw } if raw == "SP000"
        );
        assert_eq!(
            parse_subject_folder("SP000_1"),
            ParseResult::Parsed(SubjectKey::new("SP000", "1"))
        );
    }

    #[test]
    fn normalized_scan_collapses_follow_ups() {
        assert_eq!(SubjectKey::new("SP000", "1").normalized().scan_id(), "1");
        assert_eq!(SubjectKey::new("SP000", "2").normalized().scan_id(), "2");
        assert_eq!(SubjectKey::new("SP000", "7").normalized().scan_id(), "2");
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let key: SubjectKey = "SP000_2".parse().unwrap();
        assert_eq!(key.to_string(), "SP000_2");
    }
}
