//! Portal session abstraction.
//!
//! Defines the `PortalLauncher` and `PortalSession` traits that abstract over
//! the browser engine driving the case-status portal. The acquisition pipeline
//! only ever talks to these traits; the Chromium implementation lives in the
//! CLI crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::CourtResult;

/// A form control located on the live page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Selector that addresses this control for later interaction.
    pub selector: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Current value (for a `select`, the chosen option's value).
    #[serde(default)]
    pub value: Option<String>,
    /// Option values offered by a `select`; empty for inputs.
    #[serde(default)]
    pub options: Vec<String>,
}

impl FormField {
    /// Whether the name or placeholder mentions `hint` (case-insensitive).
    pub fn mentions(&self, hint: &str) -> bool {
        let hint = hint.to_lowercase();
        [&self.name, &self.placeholder]
            .into_iter()
            .flatten()
            .any(|attr| attr.to_lowercase().contains(&hint))
    }

    /// Short label for log lines.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.selector)
    }
}

/// Launches one independent portal session per acquisition.
#[async_trait]
pub trait PortalLauncher: Send + Sync {
    /// Start a fresh session (browser process + page).
    async fn launch(&self) -> CourtResult<Box<dyn PortalSession>>;
}

/// A single live page on the portal.
#[async_trait]
pub trait PortalSession: Send {
    /// Navigate to a URL, failing if it does not load within `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> CourtResult<()>;

    /// Click the first link or button whose text contains `text`, then wait
    /// for the resulting navigation.
    async fn click_link(&mut self, text: &str, timeout: Duration) -> CourtResult<()>;

    /// Wait until the document reaches a usable load state.
    async fn wait_until_loaded(&mut self, timeout: Duration) -> CourtResult<()>;

    /// All `select` controls, in document order.
    async fn select_fields(&mut self) -> CourtResult<Vec<FormField>>;

    /// Choose `value` on a `select` control.
    async fn choose_option(&mut self, field: &FormField, value: &str) -> CourtResult<()>;

    /// All text-like `input` controls, in document order.
    async fn text_inputs(&mut self) -> CourtResult<Vec<FormField>>;

    /// Replace the value of an input control.
    async fn fill(&mut self, field: &FormField, value: &str) -> CourtResult<()>;

    /// Rendered text of the page body, as a user would see it.
    async fn visible_text(&mut self) -> CourtResult<String>;

    /// Full serialized HTML of the page.
    async fn content(&mut self) -> CourtResult<String>;

    /// Release the session. Consumes the handle so it cannot be used again.
    async fn close(self: Box<Self>) -> CourtResult<()>;
}
