//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use courtfetch::progress;
use courtfetch::{
    extract, page_text, CaseFilter, CaseKey, CaseLog, CaseStore, SessionController,
    SqliteCaseLog,
};

use crate::config::{load_portal_config, PortalOverrides};
use crate::output;
use crate::renderer::{find_chromium, ChromiumLauncher};

/// Options for `courtfetch fetch`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub fresh: bool,
    pub chromium: Option<PathBuf>,
    pub portal: PortalOverrides,
}

/// Validate operator input into a case key.
pub fn parse_key(case_type: &str, case_number: &str, case_year: &str) -> Result<CaseKey> {
    let current_year = chrono::Utc::now().year();
    Ok(CaseKey::validated(
        case_type,
        case_number,
        case_year,
        current_year,
    )?)
}

fn open_log(db: &Path) -> Result<SqliteCaseLog> {
    SqliteCaseLog::open(db).with_context(|| format!("failed to open query log at {}", db.display()))
}

/// Fetch a case, from the log when a complete record exists, else live.
pub async fn fetch(db: &Path, key: CaseKey, opts: FetchOptions, json_out: bool) -> Result<()> {
    let config = load_portal_config(&opts.portal)?;
    let log = open_log(db)?;

    // Resolved lazily by the launcher: a cache hit needs no browser.
    let chrome = find_chromium(opts.chromium.as_deref());
    if chrome.is_none() {
        tracing::warn!("Chromium not found; only cached records can be served");
    }

    let (tx, mut rx) = progress::channel();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => output::print_progress(&event),
                Err(RecvError::Lagged(n)) => tracing::debug!("progress printer skipped {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let controller = SessionController::new(ChromiumLauncher::new(chrome), config).with_progress(tx);
    let store = CaseStore::new(controller, log);

    let result = if opts.fresh {
        store.fetch_fresh(&key).await
    } else {
        store.fetch(&key).await
    };

    drop(store);
    let _ = printer.await;

    if json_out {
        output::print_json(&result.outcome.to_boundary())?;
    } else {
        output::print_fetch(&result);
    }

    match &result.outcome.error {
        Some(error) if error.kind.is_fatal() => bail!("acquisition failed: {}", error.message),
        _ => Ok(()),
    }
}

pub fn history(db: &Path, key: &CaseKey, json_out: bool) -> Result<()> {
    let entries = open_log(db)?.lookup(key)?;
    if json_out {
        output::print_json(&entries)
    } else {
        output::print_entries(&entries);
        Ok(())
    }
}

pub fn search(db: &Path, filter: &CaseFilter, json_out: bool) -> Result<()> {
    let entries = open_log(db)?.search(filter)?;
    if json_out {
        output::print_json(&entries)
    } else {
        output::print_entries(&entries);
        Ok(())
    }
}

pub fn show(db: &Path, id: i64, raw: bool, json_out: bool) -> Result<()> {
    let Some(entry) = open_log(db)?.entry(id)? else {
        bail!("no query with id {id}");
    };

    if raw {
        match &entry.outcome.raw_snapshot {
            Some(html) => println!("{html}"),
            None => bail!("query {id} has no raw snapshot"),
        }
        return Ok(());
    }

    if json_out {
        output::print_json(&entry)
    } else {
        output::print_entry(&entry);
        Ok(())
    }
}

pub fn recent(db: &Path, limit: usize, json_out: bool) -> Result<()> {
    let entries = open_log(db)?.recent(limit)?;
    if json_out {
        output::print_json(&entries)
    } else {
        output::print_entries(&entries);
        Ok(())
    }
}

pub fn stats(db: &Path, json_out: bool) -> Result<()> {
    let stats = open_log(db)?.stats()?;
    if json_out {
        output::print_json(&stats)
    } else {
        output::print_stats(&stats);
        Ok(())
    }
}

pub fn case_types(json_out: bool) -> Result<()> {
    if json_out {
        let rows: Vec<_> = courtfetch::case_types::CASE_TYPES
            .iter()
            .map(|(code, description)| json!({ "code": code, "description": description }))
            .collect();
        output::print_json(&rows)
    } else {
        output::print_case_types();
        Ok(())
    }
}

/// Run the extractor over a saved results page. No browser, no log.
pub fn extract_file(path: &Path, key: &CaseKey, json_out: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let text = snapshot_text(&raw);
    let record = extract(&text, key);
    let tier = courtfetch::extract::extract_parties(&text, key).map(|m| m.tier.to_string());

    if json_out {
        output::print_json(&json!({
            "tier": tier,
            "complete": record.is_complete(),
            "data": record,
        }))
    } else {
        println!("Case: {key}");
        match &tier {
            Some(tier) => println!("[OK] Parties found by the {tier} pattern"),
            None => println!("[!!] No pattern matched the parties"),
        }
        output::print_record(&record);
        Ok(())
    }
}

/// Flatten HTML snapshots; plain text passes through.
fn snapshot_text(raw: &str) -> String {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('<') {
        page_text(raw)
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_rejects_bad_input() {
        assert!(parse_key("W.P.(C)", "11199", "2025").is_ok());
        assert!(parse_key("W.P.(C)", "11x99", "2025").is_err());
        assert!(parse_key("BOGUS", "1", "2025").is_err());
    }

    #[test]
    fn test_snapshot_text_detects_html() {
        assert_eq!(snapshot_text("  <p>A</p><p>B</p>"), "AB");
        assert_eq!(snapshot_text("A VS B"), "A VS B");
    }
}
