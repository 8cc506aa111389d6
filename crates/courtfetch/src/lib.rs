//! Courtfetch: acquisition pipeline for court case-status records, with a
//! human-solved CAPTCHA step, a regex extraction cascade and an append-only
//! query log.

pub mod case_types;
pub mod config;
pub mod extract;
pub mod outcome;
pub mod portal;
pub mod progress;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod waiter;

pub use config::{PortalConfig, WaitConfig};
pub use extract::{extract, page_text, MatchResult, PartyMatch, PartyTier};
pub use outcome::{AcquisitionOutcome, BoundaryResponse, ErrorKind, OutcomeError};
pub use portal::{FormField, PortalLauncher, PortalSession};
pub use progress::{AcquisitionState, ProgressEvent, ProgressEventKind};
pub use session::SessionController;
pub use storage::{CaseFilter, CaseLog, LogEntry, SqliteCaseLog, StoreStats};
pub use store::{Acquire, CaseStore, FetchResult, FetchSource};
pub use types::*;
pub use waiter::ResultWaiter;
