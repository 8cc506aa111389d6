//! Acquisition outcomes and the error taxonomy attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CaseKey, CaseRecord};

/// Message used when extraction found case data but not both parties.
pub const PARTIAL_EXTRACTION_MESSAGE: &str =
    "Could not extract petitioner/respondent names despite finding case data";

/// Classification of everything that can go wrong during an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Portal unreachable or never reached a usable load state. Fatal.
    #[serde(rename = "NavigationError")]
    Navigation,
    /// A form control could not be located or filled. Non-fatal.
    #[serde(rename = "FormFillError")]
    FormFill,
    /// The results predicate never fired within the bound. Non-fatal.
    #[serde(rename = "WaitTimeout")]
    WaitTimeout,
    /// Extraction produced a partial record. Informational.
    #[serde(rename = "ExtractionFailure")]
    ExtractionFailure,
    /// The query log could not persist an outcome.
    #[serde(rename = "StorageError")]
    Storage,
    /// Unexpected session fault (launch, transport). Fatal.
    #[serde(rename = "SessionError")]
    Session,
}

impl ErrorKind {
    /// Stable name used for persistence and the boundary form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "NavigationError",
            Self::FormFill => "FormFillError",
            Self::WaitTimeout => "WaitTimeout",
            Self::ExtractionFailure => "ExtractionFailure",
            Self::Storage => "StorageError",
            Self::Session => "SessionError",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NavigationError" => Some(Self::Navigation),
            "FormFillError" => Some(Self::FormFill),
            "WaitTimeout" => Some(Self::WaitTimeout),
            "ExtractionFailure" => Some(Self::ExtractionFailure),
            "StorageError" => Some(Self::Storage),
            "SessionError" => Some(Self::Session),
            _ => None,
        }
    }

    /// Whether this kind means the attempt produced no record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Navigation | Self::Session)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error kind paired with a human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OutcomeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of exactly one acquisition attempt. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionOutcome {
    pub attempt_id: Uuid,
    pub key: CaseKey,
    pub record: Option<CaseRecord>,
    pub raw_snapshot: Option<String>,
    pub error: Option<OutcomeError>,
    /// Non-fatal conditions met along the way, in order.
    #[serde(default)]
    pub warnings: Vec<OutcomeError>,
    pub timestamp: DateTime<Utc>,
}

impl AcquisitionOutcome {
    /// Outcome of an attempt that reached extraction.
    ///
    /// A partial record sets `error` to `ExtractionFailure`; the record is
    /// still carried.
    pub fn extracted(
        attempt_id: Uuid,
        key: CaseKey,
        record: CaseRecord,
        raw_snapshot: String,
        warnings: Vec<OutcomeError>,
    ) -> Self {
        let error = (!record.is_complete()).then(|| {
            OutcomeError::new(ErrorKind::ExtractionFailure, PARTIAL_EXTRACTION_MESSAGE)
        });
        Self {
            attempt_id,
            key,
            record: Some(record),
            raw_snapshot: Some(raw_snapshot),
            error,
            warnings,
            timestamp: Utc::now(),
        }
    }

    /// Outcome of an attempt that failed before a record existed.
    pub fn failed(
        attempt_id: Uuid,
        key: CaseKey,
        error: OutcomeError,
        warnings: Vec<OutcomeError>,
    ) -> Self {
        Self {
            attempt_id,
            key,
            record: None,
            raw_snapshot: None,
            error: Some(error),
            warnings,
            timestamp: Utc::now(),
        }
    }

    /// No error and a record: what the log calls a successful query.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.record.is_some()
    }

    /// Whether the carried record is complete.
    pub fn is_complete(&self) -> bool {
        self.record.as_ref().is_some_and(CaseRecord::is_complete)
    }

    /// Serialize-ready form consumed by presentation layers.
    pub fn to_boundary(&self) -> BoundaryResponse {
        BoundaryResponse {
            data: self.record.clone(),
            raw_html: self.raw_snapshot.clone(),
            error: self.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// `{data, raw_html, error}` as handed across the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryResponse {
    pub data: Option<CaseRecord>,
    pub raw_html: Option<String>,
    pub error: Option<String>,
}
