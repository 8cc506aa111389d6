//! Polls a live page until the case results are rendered.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::config::WaitConfig;
use crate::portal::PortalSession;
use crate::types::{CaseKey, CourtResult};

/// Detects when a human-submitted search has produced results.
#[derive(Debug, Clone)]
pub struct ResultWaiter {
    timeout: Duration,
    poll_interval: Duration,
    markers: Vec<String>,
}

impl ResultWaiter {
    pub fn new(config: &WaitConfig) -> Self {
        let markers = config
            .markers
            .iter()
            .chain(&config.extra_markers)
            .filter(|m| !m.is_empty())
            .cloned()
            .collect();
        Self {
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            markers,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Completion predicate: the case number is on the page together with at
    /// least one result marker.
    pub fn results_rendered(&self, page_text: &str, key: &CaseKey) -> bool {
        page_text.contains(key.case_number())
            && self.markers.iter().any(|m| page_text.contains(m.as_str()))
    }

    /// Poll `session` every interval until the predicate holds.
    ///
    /// Returns `Ok(false)` once the timeout elapses; session faults propagate.
    pub async fn await_completion(
        &self,
        session: &mut dyn PortalSession,
        key: &CaseKey,
    ) -> CourtResult<bool> {
        match tokio::time::timeout(self.timeout, self.poll_until_rendered(session, key)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn poll_until_rendered(
        &self,
        session: &mut dyn PortalSession,
        key: &CaseKey,
    ) -> CourtResult<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let text = session.visible_text().await?;
            if self.results_rendered(&text, key) {
                return Ok(());
            }
            tracing::trace!(case = %key, "results not rendered yet");
        }
    }
}
