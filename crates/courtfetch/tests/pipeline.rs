//! End-to-end pipeline tests against a scripted portal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courtfetch::progress;
use courtfetch::{
    AcquisitionState, CaseKey, CaseLog, CaseStore, CourtError, CourtResult, ErrorKind, FetchSource,
    FormField, PortalConfig, PortalLauncher, PortalSession, ProgressEventKind, SessionController,
    SqliteCaseLog, NEXT_DATE_DISPOSED,
};

const RESULTS_PAGE: &str = r#"<html><body>
<div class="banner">Delhi High Court</div>
<table id="caseTable"><tr>
<td>1</td><td>W.P.(C) - 11199/2025 [PENDING]</td><td><a href="/orders">Orders</a></td><td>SEEMA RANI &amp; ORS.</td><td>VS. MUNICIPAL CORPORATION OF DELHI</td><td>NEXT DATE: NA</td><td>Last Date: 04/08/2025</td><td>COURT NO: 12</td>
</tr></table>
</body></html>"#;

const FORM_PAGE: &str = "<html><body><form>Case Type Case Number Year Enter Captcha</form></body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailPoint {
    Launch,
    Navigate,
    FormFields,
    Wait,
    Capture,
}

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    releases: AtomicUsize,
    fills: AtomicUsize,
}

struct FakeLauncher {
    fail: Option<FailPoint>,
    /// Poll count after which the results page is shown; `None` never shows it.
    results_after: Option<usize>,
    counters: Arc<Counters>,
}

impl FakeLauncher {
    fn new(fail: Option<FailPoint>, results_after: Option<usize>) -> Self {
        Self {
            fail,
            results_after,
            counters: Arc::new(Counters::default()),
        }
    }
}

struct FakeSession {
    fail: Option<FailPoint>,
    results_after: Option<usize>,
    polls: usize,
    counters: Arc<Counters>,
}

impl FakeSession {
    fn fault(&self, point: FailPoint) -> CourtResult<()> {
        if self.fail == Some(point) {
            return Err(CourtError::Session(format!("injected fault at {point:?}")));
        }
        Ok(())
    }

    fn showing_results(&self) -> bool {
        self.results_after.is_some_and(|n| self.polls >= n)
    }
}

#[async_trait]
impl PortalLauncher for FakeLauncher {
    async fn launch(&self) -> CourtResult<Box<dyn PortalSession>> {
        if self.fail == Some(FailPoint::Launch) {
            return Err(CourtError::Session("chromium not found".into()));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            fail: self.fail,
            results_after: self.results_after,
            polls: 0,
            counters: self.counters.clone(),
        }))
    }
}

#[async_trait]
impl PortalSession for FakeSession {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> CourtResult<()> {
        if self.fail == Some(FailPoint::Navigate) {
            return Err(CourtError::Navigation(format!("timed out loading {url}")));
        }
        Ok(())
    }

    async fn click_link(&mut self, _text: &str, _timeout: Duration) -> CourtResult<()> {
        Ok(())
    }

    async fn wait_until_loaded(&mut self, _timeout: Duration) -> CourtResult<()> {
        Ok(())
    }

    async fn select_fields(&mut self) -> CourtResult<Vec<FormField>> {
        self.fault(FailPoint::FormFields)?;
        Ok(vec![
            FormField {
                selector: "select:nth-of-type(1)".into(),
                value: Some("Hindi".into()),
                options: vec!["Hindi".into(), "English".into()],
                ..Default::default()
            },
            FormField {
                selector: "select:nth-of-type(2)".into(),
                name: Some("case_type".into()),
                options: vec!["W.P.(C)".into(), "RFA".into()],
                ..Default::default()
            },
        ])
    }

    async fn choose_option(&mut self, field: &FormField, value: &str) -> CourtResult<()> {
        if field.value.as_deref() == Some("Hindi") {
            panic!("language selector must not be changed");
        }
        if !field.options.iter().any(|o| o == value) {
            return Err(CourtError::FormFill(format!("no option {value}")));
        }
        self.counters.fills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn text_inputs(&mut self) -> CourtResult<Vec<FormField>> {
        Ok(vec![
            FormField {
                selector: "input[name=\"case_number\"]".into(),
                name: Some("case_number".into()),
                ..Default::default()
            },
            FormField {
                selector: "#cy".into(),
                name: Some("case_year".into()),
                placeholder: Some("Year".into()),
                ..Default::default()
            },
        ])
    }

    async fn fill(&mut self, _field: &FormField, _value: &str) -> CourtResult<()> {
        self.counters.fills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn visible_text(&mut self) -> CourtResult<String> {
        self.polls += 1;
        if self.fail == Some(FailPoint::Wait) && self.polls > 2 {
            return Err(CourtError::Session("target crashed".into()));
        }
        let html = if self.showing_results() {
            RESULTS_PAGE
        } else {
            FORM_PAGE
        };
        Ok(courtfetch::page_text(html))
    }

    async fn content(&mut self) -> CourtResult<String> {
        self.fault(FailPoint::Capture)?;
        Ok(if self.showing_results() {
            RESULTS_PAGE.to_string()
        } else {
            FORM_PAGE.to_string()
        })
    }

    async fn close(self: Box<Self>) -> CourtResult<()> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn key() -> CaseKey {
    CaseKey::new("W.P.(C)", "11199", "2025")
}

fn config() -> PortalConfig {
    let mut config = PortalConfig::default();
    config.wait.timeout = Duration::from_secs(120);
    config
}

#[tokio::test(start_paused = true)]
async fn end_to_end_fetch_persists_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let log = SqliteCaseLog::open(&dir.path().join("queries.sqlite3")).unwrap();
    let launcher = FakeLauncher::new(None, Some(3));
    let counters = launcher.counters.clone();
    let store = CaseStore::new(SessionController::new(launcher, config()), log);

    let first = store.fetch(&key()).await;
    assert!(first.storage_error.is_none());
    assert!(first.outcome.is_complete());
    assert!(first.outcome.error.is_none());
    let record = first.outcome.record.as_ref().unwrap();
    assert_eq!(record.petitioner.as_deref(), Some("SEEMA RANI & ORS."));
    assert_eq!(
        record.respondent.as_deref(),
        Some("MUNICIPAL CORPORATION OF DELHI")
    );
    assert_eq!(record.case_status.as_deref(), Some("PENDING"));
    assert_eq!(record.next_hearing_date.as_deref(), Some(NEXT_DATE_DISPOSED));
    assert_eq!(record.court_number.as_deref(), Some("12"));

    let boundary = serde_json::to_value(first.outcome.to_boundary()).unwrap();
    assert_eq!(boundary["data"]["petitioner"], "SEEMA RANI & ORS.");
    assert!(boundary["error"].is_null());

    let second = store.fetch(&key()).await;
    assert!(second.from_cache());
    assert_eq!(second.outcome.record, first.outcome.record);
    assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    // case type, case number, year
    assert_eq!(counters.fills.load(Ordering::SeqCst), 3);

    let history = store.lookup(&key()).unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
}

#[tokio::test(start_paused = true)]
async fn every_failure_point_releases_once() {
    for point in [
        FailPoint::Navigate,
        FailPoint::FormFields,
        FailPoint::Wait,
        FailPoint::Capture,
    ] {
        let launcher = FakeLauncher::new(Some(point), Some(5));
        let counters = launcher.counters.clone();
        let controller = SessionController::new(launcher, config());

        let outcome = controller.run(&key()).await;

        assert_eq!(
            counters.releases.load(Ordering::SeqCst),
            1,
            "release count at {point:?}"
        );
        assert!(outcome.record.is_none(), "no record at {point:?}");
        let kind = outcome.error.as_ref().map(|e| e.kind);
        let expected = if point == FailPoint::Navigate {
            ErrorKind::Navigation
        } else {
            ErrorKind::Session
        };
        assert_eq!(kind, Some(expected), "error kind at {point:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn launch_failure_is_a_session_error_without_release() {
    let launcher = FakeLauncher::new(Some(FailPoint::Launch), None);
    let counters = launcher.counters.clone();
    let outcome = SessionController::new(launcher, config()).run(&key()).await;

    assert_eq!(
        outcome.error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Session)
    );
    assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
    assert_eq!(counters.releases.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn wait_timeout_is_not_fatal() {
    let launcher = FakeLauncher::new(None, None);
    let counters = launcher.counters.clone();
    let store = CaseStore::new(
        SessionController::new(launcher, config()),
        SqliteCaseLog::open_in_memory().unwrap(),
    );

    let result = store.fetch(&key()).await;
    let outcome = &result.outcome;

    assert!(outcome.record.is_some());
    assert_eq!(
        outcome.error.as_ref().map(|e| e.kind),
        Some(ErrorKind::ExtractionFailure)
    );
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.kind == ErrorKind::WaitTimeout));
    assert_eq!(counters.releases.load(Ordering::SeqCst), 1);

    let FetchSource::Live {
        entry_id: Some(id),
    } = result.source
    else {
        panic!("expected persisted live result");
    };
    let entry = store.log().entry(id).unwrap().unwrap();
    assert!(!entry.success);
    // the partial record is retained in the log
    assert!(entry.outcome.record.is_some());
}

#[tokio::test(start_paused = true)]
async fn state_machine_reports_failure_state() {
    let (tx, mut rx) = progress::channel();
    let controller = SessionController::new(FakeLauncher::new(Some(FailPoint::Navigate), None), config())
        .with_progress(tx);
    controller.run(&key()).await;

    let mut states = Vec::new();
    let mut released_after_failure = false;
    while let Ok(event) = rx.try_recv() {
        match event.event {
            ProgressEventKind::StateEntered { state } => states.push(state),
            ProgressEventKind::SessionReleased => {
                released_after_failure = states.last() == Some(&AcquisitionState::Failed);
            }
            _ => {}
        }
    }
    assert_eq!(states, vec![AcquisitionState::Init, AcquisitionState::Failed]);
    assert!(released_after_failure);
}
