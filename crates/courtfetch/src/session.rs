//! Session controller: drives one portal session from launch to teardown.
//!
//! ```text
//! INIT -> NAVIGATED -> FORM_FILLED -> AWAITING_HUMAN -> RESULTS_DETECTED -> EXTRACTED
//!   \________________________\______________\_________________\__________-> FAILED
//! ```
//!
//! The session is acquired at `INIT` and released exactly once when the
//! machine reaches either terminal state. No step is retried; a caller that
//! wants a retry runs the whole controller again with a fresh session.

use tracing::Instrument;
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::extract;
use crate::outcome::{AcquisitionOutcome, ErrorKind, OutcomeError};
use crate::portal::{PortalLauncher, PortalSession};
use crate::progress::{self, AcquisitionState, ProgressEventKind, ProgressSender};
use crate::types::{CaseKey, CaseRecord, CourtError, CourtResult};
use crate::waiter::ResultWaiter;

/// Instructions shown to the operator at the human checkpoint.
pub const CAPTCHA_INSTRUCTIONS: &str =
    "Solve the CAPTCHA in the browser window, click SUBMIT and wait for the results";

/// Runs acquisitions against the portal, one independent session per run.
pub struct SessionController<L> {
    launcher: L,
    config: PortalConfig,
    waiter: ResultWaiter,
    progress: Option<ProgressSender>,
}

impl<L: PortalLauncher> SessionController<L> {
    pub fn new(launcher: L, config: PortalConfig) -> Self {
        let waiter = ResultWaiter::new(&config.wait);
        Self {
            launcher,
            config,
            waiter,
            progress: None,
        }
    }

    /// Publish progress events on `tx` for every subsequent run.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Run one acquisition for `key`. Never panics on portal faults; every
    /// failure is reported through the returned outcome.
    pub async fn run(&self, key: &CaseKey) -> AcquisitionOutcome {
        let attempt_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "acquisition",
            %attempt_id,
            case_type = key.case_type(),
            case_number = key.case_number(),
            case_year = key.case_year()
        );
        self.run_attempt(attempt_id, key).instrument(span).await
    }

    async fn run_attempt(&self, attempt_id: Uuid, key: &CaseKey) -> AcquisitionOutcome {
        let mut attempt = Attempt::new(attempt_id, &self.progress);
        attempt.enter(AcquisitionState::Init);

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("browser launch failed: {e}");
                attempt.enter(AcquisitionState::Failed);
                let error = OutcomeError::new(ErrorKind::Session, e.to_string());
                return AcquisitionOutcome::failed(attempt_id, key.clone(), error, attempt.warnings);
            }
        };

        let driven = self.drive(session.as_mut(), key, &mut attempt).await;

        match &driven {
            Ok(_) => {
                attempt.enter(AcquisitionState::Extracted);
                if !self.config.linger_before_close.is_zero() {
                    tokio::time::sleep(self.config.linger_before_close).await;
                }
            }
            Err(error) => {
                tracing::warn!("acquisition failed: {error}");
                attempt.enter(AcquisitionState::Failed);
            }
        }

        if let Err(e) = session.close().await {
            tracing::warn!("session release reported an error: {e}");
        }
        attempt.emit(ProgressEventKind::SessionReleased);

        match driven {
            Ok((record, html)) => {
                let outcome =
                    AcquisitionOutcome::extracted(attempt_id, key.clone(), record, html, attempt.warnings);
                match &outcome.error {
                    None => tracing::info!("case record extracted"),
                    Some(e) => tracing::warn!("{e}"),
                }
                outcome
            }
            Err(error) => AcquisitionOutcome::failed(attempt_id, key.clone(), error, attempt.warnings),
        }
    }

    /// Every step between launch and release. The session stays borrowed so
    /// the caller keeps ownership for teardown.
    async fn drive(
        &self,
        session: &mut dyn PortalSession,
        key: &CaseKey,
        attempt: &mut Attempt<'_>,
    ) -> Result<(CaseRecord, String), OutcomeError> {
        self.navigate(session)
            .await
            .map_err(|e| fault(ErrorKind::Navigation, e))?;
        attempt.enter(AcquisitionState::Navigated);

        self.fill_form(session, key, attempt)
            .await
            .map_err(|e| fault(ErrorKind::Session, e))?;
        attempt.enter(AcquisitionState::FormFilled);

        attempt.enter(AcquisitionState::AwaitingHuman);
        tracing::info!("waiting for operator: {CAPTCHA_INSTRUCTIONS}");
        attempt.emit(ProgressEventKind::HumanCheckpoint {
            case: key.to_string(),
            instructions: CAPTCHA_INSTRUCTIONS.to_string(),
            timeout_secs: self.waiter.timeout().as_secs(),
        });

        let detected = self
            .waiter
            .await_completion(session, key)
            .await
            .map_err(|e| fault(ErrorKind::Session, e))?;
        if detected {
            tracing::info!("results detected");
        } else {
            let waited_ms = self.waiter.timeout().as_millis() as u64;
            tracing::warn!("no results signal after {waited_ms}ms, extracting anyway");
            attempt.emit(ProgressEventKind::WaitTimedOut { waited_ms });
            attempt.warnings.push(OutcomeError::new(
                ErrorKind::WaitTimeout,
                format!("results not detected within {}s", waited_ms / 1000),
            ));
        }
        attempt.enter(AcquisitionState::ResultsDetected);

        if !self.config.results_settle.is_zero() {
            tokio::time::sleep(self.config.results_settle).await;
        }
        let html = session
            .content()
            .await
            .map_err(|e| fault(ErrorKind::Session, e))?;
        let record = extract::extract(&extract::page_text(&html), key);
        Ok((record, html))
    }

    /// Home page, then the case-status page via its link or direct URL.
    async fn navigate(&self, session: &mut dyn PortalSession) -> CourtResult<()> {
        let cfg = &self.config;
        tracing::debug!("opening {}", cfg.home_url);
        session.goto(&cfg.home_url, cfg.navigation_timeout).await?;

        if let Err(e) = session
            .click_link(&cfg.case_status_link_text, cfg.link_timeout)
            .await
        {
            tracing::debug!(
                "'{}' link unavailable ({e}), opening {}",
                cfg.case_status_link_text,
                cfg.case_status_url
            );
            session
                .goto(&cfg.case_status_url, cfg.navigation_timeout)
                .await?;
        }

        session.wait_until_loaded(cfg.load_timeout).await?;
        if !cfg.settle_delay.is_zero() {
            tokio::time::sleep(cfg.settle_delay).await;
        }
        Ok(())
    }

    /// Best-effort form fill. Missing or unfillable controls become warnings;
    /// only a failure to enumerate controls is an error.
    async fn fill_form(
        &self,
        session: &mut dyn PortalSession,
        key: &CaseKey,
        attempt: &mut Attempt<'_>,
    ) -> CourtResult<()> {
        let cfg = &self.config;

        let mut type_set = false;
        for field in session.select_fields().await? {
            if field.value.as_deref() == Some(cfg.language_select_value.as_str()) {
                continue;
            }
            match session.choose_option(&field, key.case_type()).await {
                Ok(()) => {
                    tracing::debug!("case type set on {}", field.label());
                    type_set = true;
                    break;
                }
                Err(e) => tracing::debug!("select {} rejected case type: {e}", field.label()),
            }
        }
        if !type_set {
            attempt.skip_field("case type", "no selector accepted the case type");
        }

        let inputs = session.text_inputs().await?;

        match inputs
            .iter()
            .find(|f| f.name.as_deref() == Some(cfg.case_number_field.as_str()))
        {
            Some(field) => {
                if let Err(e) = session.fill(field, key.case_number()).await {
                    attempt.skip_field("case number", &e.to_string());
                }
            }
            None => attempt.skip_field(
                "case number",
                &format!("no input named '{}'", cfg.case_number_field),
            ),
        }

        let mut year_set = false;
        for field in inputs.iter().filter(|f| f.mentions(&cfg.year_field_hint)) {
            match session.fill(field, key.case_year()).await {
                Ok(()) => {
                    year_set = true;
                    break;
                }
                Err(e) => tracing::debug!("year input {} rejected value: {e}", field.label()),
            }
        }
        if !year_set {
            attempt.skip_field("case year", "no fillable input mentions the year");
        }

        Ok(())
    }
}

fn fault(kind: ErrorKind, error: CourtError) -> OutcomeError {
    OutcomeError::new(kind, error.to_string())
}

/// Per-run bookkeeping: state, progress sequence and collected warnings.
struct Attempt<'a> {
    id: Uuid,
    progress: &'a Option<ProgressSender>,
    seq: u64,
    warnings: Vec<OutcomeError>,
}

impl<'a> Attempt<'a> {
    fn new(id: Uuid, progress: &'a Option<ProgressSender>) -> Self {
        Self {
            id,
            progress,
            seq: 0,
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, state: AcquisitionState) {
        tracing::debug!("state -> {state}");
        self.emit(ProgressEventKind::StateEntered { state });
    }

    fn emit(&mut self, event: ProgressEventKind) {
        progress::emit(self.progress, self.id, &mut self.seq, event);
    }

    fn skip_field(&mut self, field: &str, reason: &str) {
        tracing::warn!("form field '{field}' not filled: {reason}");
        self.emit(ProgressEventKind::FieldSkipped {
            field: field.to_string(),
            reason: reason.to_string(),
        });
        self.warnings.push(OutcomeError::new(
            ErrorKind::FormFill,
            format!("{field}: {reason}"),
        ));
    }
}
