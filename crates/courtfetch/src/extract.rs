//! Case-record extraction from results-page text.
//!
//! The portal renders its results table as loosely structured text, so the
//! party names are recovered by a cascade of progressively more permissive
//! patterns:
//!
//! 1. **Structured anchor**: `TYPE - NUMBER/YEAR ... [STATUS] ... Orders`
//!    followed by `PETITIONER VS. RESPONDENT` up to `NEXT DATE` / `Last Date`
//!    / a line break.
//! 2. **Windowed table**: the text window from the case number and year up to
//!    `Showing` or a blank line, searched for a looser `X VS Y` pair.
//! 3. **Direct separator**: any uppercase `X VS. Y NEXT DATE` run anywhere on
//!    the page, with no anchoring on the case identity.
//!
//! The first tier yielding a non-empty pair after normalization wins. Status,
//! dates, court number and orders are read by independent extractors and are
//! merged whatever the cascade produced.
//!
//! Everything here is pure and synchronous: identical input text yields an
//! identical record.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use scraper::Html;

use crate::types::{
    CaseKey, CaseRecord, OrderEntry, FILING_DATE_NOT_DISPLAYED, NEXT_DATE_DISPOSED,
    NEXT_DATE_UNRESOLVED,
};

/// A run of uppercase-ish party text.
const PARTY: &str = r"[A-Z][A-Z\s&.,()]+?";

/// Literal marker the portal prints for disposed cases.
const NEXT_DATE_NA: &str = "NEXT DATE: NA";

const ORDER_DESCRIPTION: &str = "Case Orders (click Orders link on results page)";
const ORDER_LINK: &str = "Available on court website";
const ORDER_DATE_UNKNOWN: &str = "Check court records";

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static extraction pattern is valid"))
        }
    };
}

static_regex!(
    window_party_re,
    &format!(r"(?i)({PARTY})\s*VS\.?\s*({PARTY})(?:\s*NEXT DATE|\s*Last Date|\s*COURT)")
);
static_regex!(
    direct_party_re,
    &format!(r"({PARTY})VS\.?\s+({PARTY})(?:\s*NEXT DATE)")
);
static_regex!(last_date_re, r"Last Date:\s*(\d{2}/\d{2}/\d{4})");
static_regex!(next_date_re, r"NEXT DATE:\s*(\d{2}/\d{2}/\d{4})");
static_regex!(court_number_re, r"COURT NO:\s*(\d+)");
static_regex!(whitespace_re, r"\s+");
static_regex!(petitioner_residue_re, r"\s*\b(?:Orders|VS|Vs|vs)\.?\s*$");
static_regex!(
    respondent_residue_re,
    r"\s*\b(?:NEXT DATE|Last Date|COURT\s*NO)\b.*$"
);

/// Which cascade tier produced the party names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyTier {
    StructuredAnchor,
    WindowedTable,
    DirectSeparator,
}

impl std::fmt::Display for PartyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StructuredAnchor => write!(f, "structured-anchor"),
            Self::WindowedTable => write!(f, "windowed-table"),
            Self::DirectSeparator => write!(f, "direct-separator"),
        }
    }
}

/// Result of one cascade tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Found { petitioner: String, respondent: String },
    NotFound,
}

impl MatchResult {
    /// Normalize captured groups 1 and 2; both must survive non-empty.
    fn from_captures(caps: Option<Captures<'_>>) -> Self {
        let Some(caps) = caps else {
            return Self::NotFound;
        };
        let petitioner = caps
            .get(1)
            .map(|m| normalize_petitioner(m.as_str()))
            .unwrap_or_default();
        let respondent = caps
            .get(2)
            .map(|m| normalize_respondent(m.as_str()))
            .unwrap_or_default();

        if petitioner.is_empty() || respondent.is_empty() {
            Self::NotFound
        } else {
            Self::Found {
                petitioner,
                respondent,
            }
        }
    }
}

/// A single cascade tier.
pub type PartyMatcher = fn(&str, &CaseKey) -> MatchResult;

/// The cascade, in priority order.
pub const TIERS: [(PartyTier, PartyMatcher); 3] = [
    (PartyTier::StructuredAnchor, match_structured_anchor),
    (PartyTier::WindowedTable, match_windowed_table),
    (PartyTier::DirectSeparator, match_direct_separator),
];

/// Party names together with the tier that found them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyMatch {
    pub tier: PartyTier,
    pub petitioner: String,
    pub respondent: String,
}

/// Flatten an HTML document to its text nodes, concatenated in document order.
///
/// No separators are inserted between nodes, which is the layout the
/// extraction patterns expect (`OrdersSEEMA RANI ...`).
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect()
}

/// Extract a normalized record from results-page text.
pub fn extract(page_text: &str, key: &CaseKey) -> CaseRecord {
    let mut record = CaseRecord::default();

    match extract_parties(page_text, key) {
        Some(parties) => {
            tracing::debug!(tier = %parties.tier, "extracted party names");
            record.petitioner = Some(parties.petitioner);
            record.respondent = Some(parties.respondent);
        }
        None => tracing::debug!("no extraction tier matched party names"),
    }

    record.case_status = extract_status(page_text, key);
    record.last_hearing_date = first_capture(last_date_re(), page_text);
    record.court_number = first_capture(court_number_re(), page_text);
    record.next_hearing_date = Some(extract_next_date(page_text));
    record.filing_date = Some(FILING_DATE_NOT_DISPLAYED.to_string());
    record.orders = extract_orders(page_text, record.last_hearing_date.as_deref());

    record
}

/// Run the cascade; the first tier producing a non-empty pair wins.
pub fn extract_parties(page_text: &str, key: &CaseKey) -> Option<PartyMatch> {
    TIERS.iter().find_map(|(tier, matcher)| match matcher(page_text, key) {
        MatchResult::Found {
            petitioner,
            respondent,
        } => Some(PartyMatch {
            tier: *tier,
            petitioner,
            respondent,
        }),
        MatchResult::NotFound => None,
    })
}

/// Tier 1: anchored on `TYPE - NUMBER/YEAR`, a bracketed status, and `Orders`.
pub fn match_structured_anchor(page_text: &str, key: &CaseKey) -> MatchResult {
    let pattern = format!(
        r"(?is){}\s*-\s*{}\s*/\s*{}.*?\[.*?\].*?Orders({PARTY})VS\.?\s+({PARTY})(?:NEXT DATE|Last Date|\n)",
        regex::escape(key.case_type()),
        regex::escape(key.case_number()),
        regex::escape(key.case_year()),
    );
    match Regex::new(&pattern) {
        Ok(re) => MatchResult::from_captures(re.captures(page_text)),
        Err(e) => {
            tracing::warn!("structured-anchor pattern rejected: {e}");
            MatchResult::NotFound
        }
    }
}

/// Tier 2: a looser `X VS Y` search inside the case's table window.
pub fn match_windowed_table(page_text: &str, key: &CaseKey) -> MatchResult {
    let pattern = format!(
        r"(?s)({}.*?{}.*?)(?:Showing|\n\n)",
        regex::escape(key.case_number()),
        regex::escape(key.case_year()),
    );
    let window = match Regex::new(&pattern) {
        Ok(re) => re
            .captures(page_text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str()),
        Err(e) => {
            tracing::warn!("windowed-table pattern rejected: {e}");
            None
        }
    };

    match window {
        Some(window) => MatchResult::from_captures(window_party_re().captures(window)),
        None => MatchResult::NotFound,
    }
}

/// Tier 3: any `X VS. Y NEXT DATE` run, unanchored.
pub fn match_direct_separator(page_text: &str, _key: &CaseKey) -> MatchResult {
    MatchResult::from_captures(direct_party_re().captures(page_text))
}

/// Collapse whitespace runs, trim, and strip trailing `Orders` / `VS` residue.
pub fn normalize_petitioner(raw: &str) -> String {
    let mut value = collapse_whitespace(raw);
    loop {
        let stripped = petitioner_residue_re().replace(&value, "").trim().to_string();
        if stripped == value {
            return value;
        }
        value = stripped;
    }
}

/// Collapse whitespace runs, trim, and cut `NEXT DATE` / `Last Date` /
/// `COURT NO` residue.
pub fn normalize_respondent(raw: &str) -> String {
    let value = collapse_whitespace(raw);
    respondent_residue_re()
        .replace(&value, "")
        .trim()
        .to_string()
}

fn collapse_whitespace(raw: &str) -> String {
    whitespace_re().replace_all(raw, " ").trim().to_string()
}

/// Bracketed token following the case number.
fn extract_status(page_text: &str, key: &CaseKey) -> Option<String> {
    let pattern = format!(r"{}.*?\[(.*?)\]", regex::escape(key.case_number()));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("status pattern rejected: {e}");
            return None;
        }
    };
    first_capture(&re, page_text)
}

fn extract_next_date(page_text: &str) -> String {
    if page_text.contains(NEXT_DATE_NA) {
        return NEXT_DATE_DISPOSED.to_string();
    }
    first_capture(next_date_re(), page_text).unwrap_or_else(|| NEXT_DATE_UNRESOLVED.to_string())
}

/// One synthetic entry pointing at the portal when an `Orders` link exists.
fn extract_orders(page_text: &str, last_hearing_date: Option<&str>) -> Vec<OrderEntry> {
    if !page_text.contains("Orders") {
        return Vec::new();
    }
    vec![OrderEntry {
        description: ORDER_DESCRIPTION.to_string(),
        pdf_link: ORDER_LINK.to_string(),
        date: last_hearing_date.unwrap_or(ORDER_DATE_UNKNOWN).to_string(),
    }]
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "W.P.(C) - 11199/2025 [PENDING] ... OrdersSEEMA RANI & ORS.VS. \
                            MUNICIPAL CORPORATION OF DELHINEXT DATE: NA";

    fn key() -> CaseKey {
        CaseKey::new("W.P.(C)", "11199", "2025")
    }

    #[test]
    fn test_end_to_end_scenario() {
        let record = extract(SCENARIO, &key());
        assert_eq!(record.petitioner.as_deref(), Some("SEEMA RANI & ORS."));
        assert_eq!(
            record.respondent.as_deref(),
            Some("MUNICIPAL CORPORATION OF DELHI")
        );
        assert_eq!(record.case_status.as_deref(), Some("PENDING"));
        assert_eq!(
            record.next_hearing_date.as_deref(),
            Some("Case disposed - no next date")
        );
        assert_eq!(
            record.filing_date.as_deref(),
            Some(FILING_DATE_NOT_DISPLAYED)
        );
        assert!(record.is_complete());
    }

    #[test]
    fn test_tier_one_wins_over_tier_three() {
        let text = format!("ALPHA VS. BETA NEXT DATE: 01/01/2026\n{SCENARIO}");

        assert!(matches!(
            match_direct_separator(&text, &key()),
            MatchResult::Found { .. }
        ));

        let parties = extract_parties(&text, &key()).unwrap();
        assert_eq!(parties.tier, PartyTier::StructuredAnchor);
        assert_eq!(parties.petitioner, "SEEMA RANI & ORS.");
        assert_eq!(parties.respondent, "MUNICIPAL CORPORATION OF DELHI");
    }

    #[test]
    fn test_tier_three_only() {
        let text = "Listing\nALPHA TRADERS VS. UNION OF INDIA NEXT DATE: 01/02/2026";

        assert_eq!(match_structured_anchor(text, &key()), MatchResult::NotFound);
        assert_eq!(match_windowed_table(text, &key()), MatchResult::NotFound);

        let parties = extract_parties(text, &key()).unwrap();
        assert_eq!(parties.tier, PartyTier::DirectSeparator);
        assert_eq!(parties.petitioner, "ALPHA TRADERS");
        assert_eq!(parties.respondent, "UNION OF INDIA");

        let record = extract(text, &key());
        assert_eq!(record.next_hearing_date.as_deref(), Some("01/02/2026"));
    }

    #[test]
    fn test_windowed_table_tier() {
        let text = "11199/2025 [PENDING]\nRAM KUMAR VS. STATE OF DELHI COURT NO: 4\n\nShowing 1 to 1";

        let parties = extract_parties(text, &key()).unwrap();
        assert_eq!(parties.tier, PartyTier::WindowedTable);
        assert_eq!(parties.petitioner, "RAM KUMAR");
        assert_eq!(parties.respondent, "STATE OF DELHI");

        let record = extract(text, &key());
        assert_eq!(record.court_number.as_deref(), Some("4"));
        assert_eq!(record.case_status.as_deref(), Some("PENDING"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(
            normalize_petitioner("  SEEMA   RANI & ORS.VS."),
            "SEEMA RANI & ORS."
        );
        assert_eq!(normalize_petitioner("RAM\n KUMAR Orders"), "RAM KUMAR");
        assert_eq!(normalize_petitioner("DAVS"), "DAVS");
        assert_eq!(
            normalize_respondent(" STATE  OF\tDELHI NEXT DATE: 01/01/2026"),
            "STATE OF DELHI"
        );
        assert_eq!(
            normalize_respondent("HIGH COURT OF DELHI COURT NO: 3"),
            "HIGH COURT OF DELHI"
        );
    }

    #[test]
    fn test_partial_record_keeps_status() {
        let text = "W.P.(C) - 11199/2025 [DISPOSED]\nOrders\nLast Date: 12/03/2025\nCOURT NO: 14";
        let record = extract(text, &key());

        assert_eq!(record.case_status.as_deref(), Some("DISPOSED"));
        assert!(record.petitioner.is_none());
        assert!(record.respondent.is_none());
        assert!(!record.is_complete());
        assert_eq!(record.last_hearing_date.as_deref(), Some("12/03/2025"));
        assert_eq!(record.court_number.as_deref(), Some("14"));
    }

    #[test]
    fn test_next_date_sentinels() {
        let disposed = extract("foo NEXT DATE: NA bar", &key());
        assert_eq!(
            disposed.next_hearing_date.as_deref(),
            Some("Case disposed - no next date")
        );

        let unresolved = extract("nothing to see here", &key());
        assert_eq!(
            unresolved.next_hearing_date.as_deref(),
            Some("Check latest orders for next date")
        );

        let dated = extract("NEXT DATE: 15/01/2026", &key());
        assert_eq!(dated.next_hearing_date.as_deref(), Some("15/01/2026"));
    }

    #[test]
    fn test_orders_entry() {
        let with_date = extract("Orders Last Date: 02/02/2025", &key());
        assert_eq!(with_date.orders.len(), 1);
        assert_eq!(with_date.orders[0].date, "02/02/2025");
        assert_eq!(with_date.orders[0].pdf_link, ORDER_LINK);

        let without_date = extract("Orders", &key());
        assert_eq!(without_date.orders[0].date, ORDER_DATE_UNKNOWN);

        assert!(extract("no listing", &key()).orders.is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        assert_eq!(extract(SCENARIO, &key()), extract(SCENARIO, &key()));
    }

    #[test]
    fn test_page_text_concatenates_nodes() {
        let html = "<html><body><table><tr><td>W.P.(C) - 11199/2025 [PENDING]</td>\
                    <td><a href=\"#\">Orders</a></td><td>SEEMA RANI &amp; ORS.VS. \
                    MUNICIPAL CORPORATION OF DELHI</td><td>NEXT DATE: NA</td></tr></table></body></html>";
        let text = page_text(html);
        assert!(text.contains("OrdersSEEMA RANI & ORS."));

        let record = extract(&text, &key());
        assert_eq!(record.petitioner.as_deref(), Some("SEEMA RANI & ORS."));
        assert_eq!(
            record.respondent.as_deref(),
            Some("MUNICIPAL CORPORATION OF DELHI")
        );
    }
}
