//! Terminal rendering for command results.

use anyhow::Result;
use serde::Serialize;

use courtfetch::case_types::CASE_TYPES;
use courtfetch::{
    AcquisitionOutcome, CaseRecord, FetchResult, FetchSource, LogEntry, ProgressEvent,
    ProgressEventKind, StoreStats,
};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_fetch(result: &FetchResult) {
    match &result.source {
        FetchSource::Cache {
            entry_id,
            cached_at,
        } => println!(
            "[OK] Served from query log (entry #{entry_id}, fetched {})",
            cached_at.format("%Y-%m-%d %H:%M UTC")
        ),
        FetchSource::Live {
            entry_id: Some(id),
        } => println!("[OK] Fetched live, logged as entry #{id}"),
        FetchSource::Live { entry_id: None } => println!("[!!] Fetched live, NOT logged"),
    }
    if let Some(err) = &result.storage_error {
        eprintln!("[!!] Storage error: {err}");
    }
    print_outcome(&result.outcome);
}

pub fn print_outcome(outcome: &AcquisitionOutcome) {
    println!("Case:    {}", outcome.key);
    println!("Attempt: {}", outcome.attempt_id);
    if let Some(record) = &outcome.record {
        print_record(record);
    }
    for warning in &outcome.warnings {
        println!("[..] {warning}");
    }
    if let Some(error) = &outcome.error {
        let sym = if error.kind.is_fatal() { "[!!]" } else { "[??]" };
        println!("{sym} {error}");
    }
}

pub fn print_record(record: &CaseRecord) {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!();
    println!("  Petitioner:   {}", field(&record.petitioner));
    println!("  Respondent:   {}", field(&record.respondent));
    println!("  Status:       {}", field(&record.case_status));
    println!("  Filing date:  {}", field(&record.filing_date));
    println!("  Last hearing: {}", field(&record.last_hearing_date));
    println!("  Next hearing: {}", field(&record.next_hearing_date));
    println!("  Court no.:    {}", field(&record.court_number));
    if record.orders.is_empty() {
        println!("  Orders:       none listed");
    } else {
        println!("  Orders:");
        for order in &record.orders {
            println!(
                "    - {} ({}) {}",
                order.description, order.date, order.pdf_link
            );
        }
    }
    println!();
}

pub fn print_entries(entries: &[LogEntry]) {
    if entries.is_empty() {
        println!("No queries logged.");
        return;
    }
    println!(
        "{:>5}  {:<20}  {:<22}  {:<4}  PARTIES",
        "ID", "WHEN", "CASE", "OK"
    );
    for entry in entries {
        let parties = entry
            .outcome
            .record
            .as_ref()
            .and_then(|r| Some(format!("{} vs {}", r.petitioner.as_ref()?, r.respondent.as_ref()?)))
            .or_else(|| entry.outcome.error.as_ref().map(|e| e.kind.to_string()))
            .unwrap_or_default();
        println!(
            "{:>5}  {:<20}  {:<22}  {:<4}  {}",
            entry.id,
            entry.outcome.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.outcome.key.to_string(),
            if entry.success { "yes" } else { "no" },
            parties
        );
    }
}

pub fn print_entry(entry: &LogEntry) {
    println!("Entry #{} (logged {})", entry.id, entry.created_at.to_rfc3339());
    println!("Success: {}", if entry.success { "yes" } else { "no" });
    if let Some(reason) = &entry.unreadable_record {
        println!("[!!] Stored record is unreadable: {reason}");
    }
    print_outcome(&entry.outcome);
    if let Some(raw) = &entry.outcome.raw_snapshot {
        println!("Raw snapshot: {} bytes (use --raw to print)", raw.len());
    }
}

pub fn print_stats(stats: &StoreStats) {
    println!("Total queries: {}", stats.total);
    println!("Successful:    {}", stats.successful);
    println!("Failed:        {}", stats.failed);
    println!("Success rate:  {:.2}%", stats.success_rate);
    match &stats.most_recent {
        Some(ts) => println!("Most recent:   {}", ts.to_rfc3339()),
        None => println!("Most recent:   -"),
    }
}

pub fn print_case_types() {
    for (code, description) in CASE_TYPES {
        println!("{code:<14} {description}");
    }
}

/// Progress lines go to stderr so `--json` output stays clean.
pub fn print_progress(event: &ProgressEvent) {
    match &event.event {
        ProgressEventKind::HumanCheckpoint {
            case,
            instructions,
            timeout_secs,
        } => {
            eprintln!();
            eprintln!("  >> ACTION REQUIRED for {case}");
            eprintln!("  >> {instructions}");
            eprintln!("  >> Waiting up to {timeout_secs}s for results...");
            eprintln!();
        }
        ProgressEventKind::FieldSkipped { field, reason } => {
            eprintln!("  [!!] Could not fill {field}: {reason}. Fill it in the browser.");
        }
        ProgressEventKind::WaitTimedOut { waited_ms } => {
            eprintln!(
                "  [??] No results seen after {}s, extracting from the current page",
                waited_ms / 1000
            );
        }
        ProgressEventKind::Warning { message } => eprintln!("  [!!] {message}"),
        ProgressEventKind::StateEntered { .. } | ProgressEventKind::SessionReleased => {}
    }
}
