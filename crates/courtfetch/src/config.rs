//! Portal and wait configuration.
//!
//! Defaults match the live case-status portal. Overrides are read from
//! `COURTFETCH_*` environment variables; callers may then adjust individual
//! fields (CLI flags win over the environment).

use std::time::Duration;

use url::Url;

use crate::types::{CourtError, CourtResult};

pub const DEFAULT_HOME_URL: &str = "https://delhihighcourt.nic.in/";
pub const DEFAULT_CASE_STATUS_URL: &str = "https://delhihighcourt.nic.in/app/get-case-type-status";

/// Results are waited for by a human; ten minutes is the default bound.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// How the result waiter decides that results are on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Markers indicating a rendered result table; any one suffices.
    pub markers: Vec<String>,
    /// Site-specific markers added on top of `markers` (e.g. a party name
    /// seen on a previous run). Optional and removable.
    pub extra_markers: Vec<String>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: Duration::from_secs(1),
            markers: vec!["Petitioner".to_string(), "VS".to_string()],
            extra_markers: Vec::new(),
        }
    }
}

/// Everything the session controller needs to drive the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub home_url: String,
    pub case_status_url: String,
    pub case_status_link_text: String,
    pub navigation_timeout: Duration,
    pub link_timeout: Duration,
    pub load_timeout: Duration,
    /// Pause after the case-status page loads, before touching the form.
    pub settle_delay: Duration,
    /// Current value of the language `select`, which must not be touched.
    pub language_select_value: String,
    pub case_number_field: String,
    pub year_field_hint: String,
    /// Pause after results are detected, before capturing the page.
    pub results_settle: Duration,
    /// Keep the window open this long after a completed capture.
    pub linger_before_close: Duration,
    pub wait: WaitConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_string(),
            case_status_url: DEFAULT_CASE_STATUS_URL.to_string(),
            case_status_link_text: "Case Status".to_string(),
            navigation_timeout: Duration::from_secs(60),
            link_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            language_select_value: "Hindi".to_string(),
            case_number_field: "case_number".to_string(),
            year_field_hint: "year".to_string(),
            results_settle: Duration::from_secs(2),
            linger_before_close: Duration::from_secs(10),
            wait: WaitConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Defaults with `COURTFETCH_*` environment overrides applied.
    pub fn from_env() -> CourtResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides pulled from `lookup` (an environment stand-in).
    pub fn from_lookup<F>(lookup: F) -> CourtResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("COURTFETCH_PORTAL_URL") {
            config.home_url = url;
        }
        if let Some(url) = lookup("COURTFETCH_CASE_STATUS_URL") {
            config.case_status_url = url;
        }
        if let Some(secs) = lookup("COURTFETCH_WAIT_TIMEOUT_SECS") {
            config.wait.timeout = Duration::from_secs(parse_number(
                "COURTFETCH_WAIT_TIMEOUT_SECS",
                &secs,
            )?);
        }
        if let Some(ms) = lookup("COURTFETCH_POLL_INTERVAL_MS") {
            config.wait.poll_interval =
                Duration::from_millis(parse_number("COURTFETCH_POLL_INTERVAL_MS", &ms)?);
        }
        if let Some(markers) = lookup("COURTFETCH_RESULT_MARKERS") {
            config.wait.extra_markers = markers
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = lookup("COURTFETCH_LINGER_SECS") {
            config.linger_before_close =
                Duration::from_secs(parse_number("COURTFETCH_LINGER_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URLs and intervals.
    pub fn validate(&self) -> CourtResult<()> {
        for (label, raw) in [
            ("portal URL", &self.home_url),
            ("case-status URL", &self.case_status_url),
        ] {
            let url = Url::parse(raw)
                .map_err(|e| CourtError::Config(format!("invalid {label} '{raw}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(CourtError::Config(format!(
                    "{label} must be http(s), got '{raw}'"
                )));
            }
        }
        if self.wait.poll_interval.is_zero() {
            return Err(CourtError::Config(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number(name: &str, raw: &str) -> CourtResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| CourtError::Config(format!("{name} must be a whole number, got '{raw}'")))
}
