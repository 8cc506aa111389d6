//! Progress event types and broadcast channel for acquisition telemetry.
//!
//! The session controller emits `ProgressEvent`s while it drives the portal.
//! They flow through a `tokio::sync::broadcast` channel to every subscriber
//! (the CLI uses one to show the CAPTCHA checkpoint). With no subscriber the
//! events are dropped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// States of the acquisition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionState {
    Init,
    Navigated,
    FormFilled,
    AwaitingHuman,
    ResultsDetected,
    Extracted,
    Failed,
}

impl AcquisitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Navigated => write!(f, "NAVIGATED"),
            Self::FormFilled => write!(f, "FORM_FILLED"),
            Self::AwaitingHuman => write!(f, "AWAITING_HUMAN"),
            Self::ResultsDetected => write!(f, "RESULTS_DETECTED"),
            Self::Extracted => write!(f, "EXTRACTED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A progress event emitted during an acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The attempt this event belongs to.
    pub attempt_id: Uuid,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The state machine entered a new state.
    StateEntered { state: AcquisitionState },
    /// The form is filled; a human must now solve the CAPTCHA and submit.
    HumanCheckpoint {
        case: String,
        instructions: String,
        timeout_secs: u64,
    },
    /// A form control could not be located or filled.
    FieldSkipped { field: String, reason: String },
    /// The results predicate did not fire in time; extraction proceeds anyway.
    WaitTimedOut { waited_ms: u64 },
    /// The browser session was released.
    SessionReleased,
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// An acquisition emits a dozen or so events; 256 leaves room for slow readers.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(
    tx: &Option<ProgressSender>,
    attempt_id: Uuid,
    seq: &mut u64,
    event: ProgressEventKind,
) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            attempt_id,
            seq: *seq,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            attempt_id: Uuid::nil(),
            seq: 1,
            event: ProgressEventKind::StateEntered {
                state: AcquisitionState::AwaitingHuman,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StateEntered"));
        assert!(json.contains("AWAITING_HUMAN"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 1);
        assert_eq!(parsed.attempt_id, Uuid::nil());
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        let mut seq = 0;
        emit(
            &Some(tx),
            Uuid::nil(),
            &mut seq,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
        assert_eq!(seq, 1);
    }

    #[test]
    fn test_emit_none_sender() {
        let mut seq = 0;
        emit(&None, Uuid::nil(), &mut seq, ProgressEventKind::SessionReleased);
        assert_eq!(seq, 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (tx, mut rx) = channel();
        let tx = Some(tx);
        let id = Uuid::new_v4();
        let mut seq = 0;
        emit(
            &tx,
            id,
            &mut seq,
            ProgressEventKind::StateEntered {
                state: AcquisitionState::Init,
            },
        );
        emit(&tx, id, &mut seq, ProgressEventKind::SessionReleased);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));
        assert!(matches!(second.event, ProgressEventKind::SessionReleased));
    }

    #[test]
    fn test_terminal_states() {
        assert!(AcquisitionState::Extracted.is_terminal());
        assert!(AcquisitionState::Failed.is_terminal());
        assert!(!AcquisitionState::AwaitingHuman.is_terminal());
        assert_eq!(AcquisitionState::FormFilled.to_string(), "FORM_FILLED");
    }
}
