//! Browser backends for the portal session traits.
//!
//! Only Chromium (via chromiumoxide) is provided. It runs headed because the
//! operator has to solve the CAPTCHA in the window.

pub mod chromium;

use std::path::{Path, PathBuf};

pub use chromium::{ChromiumLauncher, ChromiumSession};

/// Find the Chromium binary path.
///
/// Order: explicit path, `COURTFETCH_CHROMIUM_PATH`, `PATH`, common macOS
/// location.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    if let Ok(p) = std::env::var("COURTFETCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("COURTFETCH_CHROMIUM_PATH points to a missing file: {p}");
    }

    for candidate in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(candidate) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}
