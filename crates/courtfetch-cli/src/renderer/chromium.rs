//! Chromium-backed portal session using chromiumoxide.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use courtfetch::{CourtError, CourtResult, FormField, PortalLauncher, PortalSession};

/// Desktop Chrome user agent; the portal serves a degraded page to headless UAs.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const READY_POLL: Duration = Duration::from_millis(250);

/// Tags each matching control with a stable attribute and describes it.
const DESCRIBE_CONTROLS: &str = r#"(() => {
    const prefix = __PREFIX__;
    return Array.from(document.querySelectorAll(__QUERY__)).map((el, i) => {
        const id = prefix + '-' + i;
        el.setAttribute('data-courtfetch', id);
        return {
            selector: '[data-courtfetch="' + id + '"]',
            name: el.getAttribute('name'),
            placeholder: el.getAttribute('placeholder'),
            value: el.value === undefined ? null : el.value,
            options: el.options ? Array.from(el.options).map(o => o.value) : [],
        };
    });
})()"#;

/// Launches one headed Chromium process per acquisition.
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    window_size: (u32, u32),
}

impl ChromiumLauncher {
    /// `None` makes every launch fail with a session error.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            window_size: (1280, 900),
        }
    }

    fn browser_config(&self) -> CourtResult<BrowserConfig> {
        let executable = self.executable.as_ref().ok_or_else(|| {
            CourtError::Session(
                "Chromium not found. Install Chrome/Chromium, pass --chromium or set COURTFETCH_CHROMIUM_PATH."
                    .into(),
            )
        })?;
        let (width, height) = self.window_size;
        BrowserConfig::builder()
            .chrome_executable(executable)
            .with_head()
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| CourtError::Session(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl PortalLauncher for ChromiumLauncher {
    async fn launch(&self) -> CourtResult<Box<dyn PortalSession>> {
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| CourtError::Session(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(CourtError::Session(format!("failed to open a page: {e}")));
            }
        };

        tracing::debug!("Chromium launched");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

/// A live Chromium window on the portal.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumSession {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> CourtResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| CourtError::Session(format!("script evaluation failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| CourtError::Session(format!("unexpected script result: {e:?}")))
    }

    async fn describe(&self, prefix: &str, query: &str) -> CourtResult<Vec<FormField>> {
        let script = DESCRIBE_CONTROLS
            .replace("__PREFIX__", &js_string(prefix))
            .replace("__QUERY__", &js_string(query));
        self.eval(&script).await
    }

    /// Run `body` against the element addressed by `field`; `body` sees it as
    /// `el` and must evaluate to a boolean.
    async fn with_element(&self, field: &FormField, body: &str) -> CourtResult<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; {body} }})()",
            js_string(&field.selector)
        );
        self.eval(&script).await
    }

    async fn wait_for_ready_state(&self) {
        loop {
            match self.eval::<String>("document.readyState").await {
                Ok(state) if state == "interactive" || state == "complete" => return,
                Ok(_) => {}
                Err(e) => tracing::trace!("readyState not available yet: {e}"),
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> CourtResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CourtError::Navigation(format!("failed to open {url}: {e}"))),
            Err(_) => Err(CourtError::Navigation(format!(
                "timed out after {}s opening {url}",
                timeout.as_secs()
            ))),
        }
    }

    async fn click_link(&mut self, text: &str, timeout: Duration) -> CourtResult<()> {
        let script = format!(
            r#"(() => {{
                const wanted = {};
                const el = Array.from(document.querySelectorAll('a, button, [role="link"]'))
                    .find(e => (e.innerText || e.textContent || '').includes(wanted));
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            js_string(text)
        );
        let clicked: bool = self.eval(&script).await?;
        if !clicked {
            return Err(CourtError::Navigation(format!("no link with text '{text}'")));
        }

        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CourtError::Navigation(format!(
                "navigation after clicking '{text}' failed: {e}"
            ))),
            Err(_) => Err(CourtError::Navigation(format!(
                "clicking '{text}' did not navigate within {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn wait_until_loaded(&mut self, timeout: Duration) -> CourtResult<()> {
        tokio::time::timeout(timeout, self.wait_for_ready_state())
            .await
            .map_err(|_| {
                CourtError::Navigation(format!(
                    "page did not reach a usable load state within {}s",
                    timeout.as_secs()
                ))
            })
    }

    async fn select_fields(&mut self) -> CourtResult<Vec<FormField>> {
        self.describe("select", "select").await
    }

    async fn choose_option(&mut self, field: &FormField, value: &str) -> CourtResult<()> {
        let body = format!(
            "const wanted = {};
             if (!Array.from(el.options || []).some(o => o.value === wanted)) return false;
             el.value = wanted;
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));
             return true;",
            js_string(value)
        );
        if self.with_element(field, &body).await? {
            Ok(())
        } else {
            Err(CourtError::FormFill(format!(
                "{} has no option '{value}'",
                field.label()
            )))
        }
    }

    async fn text_inputs(&mut self) -> CourtResult<Vec<FormField>> {
        self.describe("input", r#"input[type="text"], input:not([type])"#)
            .await
    }

    async fn fill(&mut self, field: &FormField, value: &str) -> CourtResult<()> {
        let body = format!(
            "if (el.disabled || el.readOnly) return false;
             el.focus();
             el.value = {};
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));
             return true;",
            js_string(value)
        );
        if self.with_element(field, &body).await? {
            Ok(())
        } else {
            Err(CourtError::FormFill(format!(
                "{} is missing or not editable",
                field.label()
            )))
        }
    }

    async fn visible_text(&mut self) -> CourtResult<String> {
        self.eval("document.body ? document.body.innerText : ''")
            .await
    }

    async fn content(&mut self) -> CourtResult<String> {
        self.eval("document.documentElement.outerHTML").await
    }

    async fn close(self: Box<Self>) -> CourtResult<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;

        if let Err(e) = page.close().await {
            tracing::debug!("page close failed: {e}");
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::debug!("waiting for Chromium to exit failed: {e}");
        }
        handler_task.abort();

        closed
            .map(|_| ())
            .map_err(|e| CourtError::Session(format!("failed to close Chromium: {e}")))
    }
}

/// Encode `raw` as a JavaScript string literal.
fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::find_chromium;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("W.P.(C)"), r#""W.P.(C)""#);
        assert_eq!(js_string(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(js_string("line\nbreak"), r#""line\nbreak""#);
    }

    #[tokio::test]
    async fn test_launch_without_executable_is_a_session_error() {
        let launcher = ChromiumLauncher::new(None);
        match launcher.launch().await {
            Err(CourtError::Session(msg)) => assert!(msg.contains("Chromium not found")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should fail"),
        }
    }

    #[test]
    fn test_describe_script_is_filled_in() {
        let script = DESCRIBE_CONTROLS
            .replace("__PREFIX__", &js_string("select"))
            .replace("__QUERY__", &js_string("select"));
        assert!(!script.contains("__"));
        assert!(script.contains(r#"const prefix = "select";"#));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium and a display
    async fn test_chromium_session_fills_a_form() {
        let path = find_chromium(None).expect("Chromium not installed");
        let launcher = ChromiumLauncher::new(Some(path));
        let mut session = launcher.launch().await.expect("launch failed");

        session
            .goto(
                "data:text/html,<select><option>Hindi</option></select>\
                 <select name=ct><option value=RFA>RFA</option></select>\
                 <input type=text name=case_number><input type=text placeholder=Year>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");
        session
            .wait_until_loaded(Duration::from_secs(10))
            .await
            .expect("page never loaded");

        let selects = session.select_fields().await.unwrap();
        assert_eq!(selects.len(), 2);
        assert_eq!(selects[0].value.as_deref(), Some("Hindi"));
        session.choose_option(&selects[1], "RFA").await.unwrap();
        assert!(session.choose_option(&selects[1], "NOPE").await.is_err());

        let inputs = session.text_inputs().await.unwrap();
        assert_eq!(inputs.len(), 2);
        session.fill(&inputs[0], "11199").await.unwrap();
        assert!(inputs[1].mentions("year"));

        let html = session.content().await.unwrap();
        assert!(html.contains("case_number"));

        session.close().await.expect("close failed");
    }
}
