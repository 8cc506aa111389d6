//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use courtfetch::PortalConfig;

/// Database file looked up in the working directory.
pub const LOCAL_DB_FILE: &str = "queries.sqlite3";

/// Resolve the query log path.
///
/// Order: explicit `--db`, `COURTFETCH_DB`, `./queries.sqlite3` when present,
/// `~/.courtfetch/queries.sqlite3`.
pub fn resolve_db_path(explicit: Option<&Path>) -> PathBuf {
    resolve_db_path_from(
        explicit,
        std::env::var("COURTFETCH_DB").ok(),
        Path::new(LOCAL_DB_FILE),
        dirs::home_dir(),
    )
}

fn resolve_db_path_from(
    explicit: Option<&Path>,
    env_path: Option<String>,
    local: &Path,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(env_path) = env_path.filter(|p| !p.is_empty()) {
        return PathBuf::from(env_path);
    }

    if local.exists() {
        return local.to_path_buf();
    }

    home.unwrap_or_else(|| PathBuf::from("."))
        .join(".courtfetch")
        .join(LOCAL_DB_FILE)
}

/// Portal settings given on the command line. Unset fields keep the
/// environment or default value.
#[derive(Debug, Clone, Default)]
pub struct PortalOverrides {
    pub wait_timeout_secs: Option<u64>,
    pub linger_secs: Option<u64>,
    pub markers: Vec<String>,
}

/// Defaults, then `COURTFETCH_*` environment, then command-line flags.
pub fn load_portal_config(overrides: &PortalOverrides) -> Result<PortalConfig> {
    let config = PortalConfig::from_env().context("invalid COURTFETCH_* environment")?;
    apply_overrides(config, overrides)
}

fn apply_overrides(mut config: PortalConfig, overrides: &PortalOverrides) -> Result<PortalConfig> {
    if let Some(secs) = overrides.wait_timeout_secs {
        config.wait.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = overrides.linger_secs {
        config.linger_before_close = Duration::from_secs(secs);
    }
    if !overrides.markers.is_empty() {
        config.wait.extra_markers = overrides.markers.clone();
    }
    config.validate().context("invalid portal configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_db_path_from(
            Some(Path::new("/tmp/explicit.sqlite3")),
            Some("/tmp/env.sqlite3".into()),
            Path::new("Cargo.toml"),
            None,
        );
        assert_eq!(path, PathBuf::from("/tmp/explicit.sqlite3"));
    }

    #[test]
    fn test_env_beats_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join(LOCAL_DB_FILE);
        std::fs::write(&local, b"").unwrap();

        let path = resolve_db_path_from(None, Some("/tmp/env.sqlite3".into()), &local, None);
        assert_eq!(path, PathBuf::from("/tmp/env.sqlite3"));

        let path = resolve_db_path_from(None, Some(String::new()), &local, None);
        assert_eq!(path, local);
    }

    #[test]
    fn test_home_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_db_path_from(
            None,
            None,
            &dir.path().join("missing.sqlite3"),
            Some(PathBuf::from("/home/clerk")),
        );
        assert_eq!(path, PathBuf::from("/home/clerk/.courtfetch/queries.sqlite3"));
    }

    #[test]
    fn test_flags_override_config() {
        let config = apply_overrides(
            PortalConfig::default(),
            &PortalOverrides {
                wait_timeout_secs: Some(45),
                linger_secs: Some(0),
                markers: vec!["SEEMA RANI".into()],
            },
        )
        .unwrap();
        assert_eq!(config.wait.timeout, Duration::from_secs(45));
        assert!(config.linger_before_close.is_zero());
        assert_eq!(config.wait.extra_markers, vec!["SEEMA RANI"]);
    }
}
