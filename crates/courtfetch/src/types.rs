//! Core data types for case queries and extracted case records.

use serde::{Deserialize, Serialize};

use crate::case_types;

/// Sentinel for `next_hearing_date` when the portal reports `NEXT DATE: NA`.
pub const NEXT_DATE_DISPOSED: &str = "Case disposed - no next date";

/// Sentinel for `next_hearing_date` when no next date could be read.
pub const NEXT_DATE_UNRESOLVED: &str = "Check latest orders for next date";

/// Sentinel for `filing_date`; the results page never shows it.
pub const FILING_DATE_NOT_DISPLAYED: &str = "Not displayed on results page";

/// Earliest case year the portal accepts.
pub const MIN_CASE_YEAR: i32 = 1947;

/// Identity of a case query.
///
/// Two keys with identical fields denote the same logical case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    case_type: String,
    case_number: String,
    case_year: String,
}

impl CaseKey {
    /// Build a key from pre-validated input.
    pub fn new(
        case_type: impl Into<String>,
        case_number: impl Into<String>,
        case_year: impl Into<String>,
    ) -> Self {
        Self {
            case_type: case_type.into(),
            case_number: case_number.into(),
            case_year: case_year.into(),
        }
    }

    /// Build a key from raw operator input, checking the portal's constraints.
    ///
    /// - `case_type` must be a known code (see [`case_types::CASE_TYPES`])
    /// - `case_number` must be a non-empty run of ASCII digits
    /// - `case_year` must be four digits in `1947..=current_year + 1`
    pub fn validated(
        case_type: &str,
        case_number: &str,
        case_year: &str,
        current_year: i32,
    ) -> CourtResult<Self> {
        let case_type = case_type.trim();
        let case_number = case_number.trim();
        let case_year = case_year.trim();

        if case_type.is_empty() || case_number.is_empty() || case_year.is_empty() {
            return Err(CourtError::InvalidKey("all fields are required".into()));
        }
        if !case_types::is_known(case_type) {
            return Err(CourtError::InvalidKey(format!(
                "unknown case type: {case_type}"
            )));
        }
        if !case_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(CourtError::InvalidKey(
                "case number must contain only digits".into(),
            ));
        }
        if case_year.len() != 4 || !case_year.chars().all(|c| c.is_ascii_digit()) {
            return Err(CourtError::InvalidKey(
                "year must be a four-digit number".into(),
            ));
        }
        let year: i32 = case_year
            .parse()
            .map_err(|_| CourtError::InvalidKey(format!("invalid year: {case_year}")))?;
        if year < MIN_CASE_YEAR || year > current_year + 1 {
            return Err(CourtError::InvalidKey(format!(
                "year must be between {MIN_CASE_YEAR} and {}",
                current_year + 1
            )));
        }

        Ok(Self::new(case_type, case_number, case_year))
    }

    pub fn case_type(&self) -> &str {
        &self.case_type
    }

    pub fn case_number(&self) -> &str {
        &self.case_number
    }

    pub fn case_year(&self) -> &str {
        &self.case_year
    }
}

impl std::fmt::Display for CaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.case_type, self.case_number, self.case_year)
    }
}

/// One order attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub description: String,
    pub pdf_link: String,
    pub date: String,
}

/// Normalized case record extracted from a results page.
///
/// A record is complete when both parties are present and non-empty;
/// otherwise it is partial. Partial records are kept, not discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub petitioner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hearing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hearing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court_number: Option<String>,
    #[serde(default)]
    pub orders: Vec<OrderEntry>,
}

impl CaseRecord {
    /// Both parties present and non-empty.
    pub fn is_complete(&self) -> bool {
        fn filled(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        filled(&self.petitioner) && filled(&self.respondent)
    }
}

/// Errors raised by the acquisition pipeline and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum CourtError {
    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Form fill error: {0}")]
    FormFill(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid case key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type CourtResult<T> = Result<T, CourtError>;
