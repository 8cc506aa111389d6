//! Courtfetch command-line front end: Chromium portal session, path
//! resolution and terminal output.

pub mod commands;
pub mod config;
pub mod output;
pub mod renderer;

pub use config::{load_portal_config, resolve_db_path, PortalOverrides};
pub use renderer::{find_chromium, ChromiumLauncher};
