//! Label-anchored business field extraction.
//!
//! Text fields are looked up line by line, never with a document-wide regex,
//! so a label cannot pick up a value from a neighbouring line (or match
//! "port" inside "report"). Numeric fields use anchor patterns over the
//! joined, lowercased text; the rate is the exception and stays line-scoped.

use std::sync::LazyLock;

use regex::Regex;

use super::labels::BusinessLabels;
use super::types::{BusinessRecord, Operation};
use crate::config::ConfigError;
use crate::pipeline::layout::Line;

/// Lines after a label-only line searched for its value.
const LOOKAHEAD_LINES: usize = 3;

const RATE_UNITS: &str = r"(?:mt/?day|mt\s*per\s*day|tons\s*per\s*day|t/day|tpd|per\s*day)";

static LEADING_LINK_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\b(?:at|to|for)\b\s+").expect("valid regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PORT_OF_LOADING_OR_DISCHARGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)port\s+of\s+(?:loading|discharging)").expect("valid regex")
});
static MOTOR_VESSEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(m\.?v\.?)\s+([a-z0-9][a-z0-9\s\-]+)").expect("valid regex")
});
static LOAD_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:load|loading)\b").expect("valid regex"));
static DISCHARGE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:discharge|discharging)\b").expect("valid regex"));
static DEMURRAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"demurrage[^\d]*([0-9][0-9,\.]*)").expect("valid regex"));
static DISPATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:dispatch|despatch)[^\d]*([0-9][0-9,\.]*)").expect("valid regex")
});
static ALLOWED_LAYTIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:allowed\s+laytime|laytime|allowed)[^\d]*([0-9][0-9,\.]*)").expect("valid regex")
});
static QUANTITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?:cargo\s*(?:qty|quantity)|quantity|qty)[^\d]*([0-9][0-9,\.]*)")
            .expect("valid regex"),
        Regex::new(r"([0-9][0-9,\.]*)\s*(?:mts|mt|metric\s+tons|tons)\b").expect("valid regex"),
    ]
});
static RATE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\brate\b|{RATE_UNITS}")).expect("valid regex"));
static RATE_BEFORE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"([0-9][0-9,\.]*)\s*{RATE_UNITS}")).expect("valid regex")
});
static RATE_AFTER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brate\b[^\d]*([0-9][0-9,\.]*)").expect("valid regex"));

/// The three line-scoped lookups for one label.
struct LabelPatterns {
    /// `label [<=3 words] [:-] value`
    same_line: Regex,
    /// `label [<=3 words] :` with nothing after it
    label_only: Regex,
    /// `label [<=5 words] : value`
    extended: Regex,
}

impl LabelPatterns {
    fn compile(label: &str) -> Result<Self, ConfigError> {
        let l = regex::escape(label);
        Ok(Self {
            same_line: compile(&format!(r"(?i)\b{l}\b(?:\s+[A-Za-z]+){{0,3}}\s*[:\-]\s*(.+)"))?,
            label_only: compile(&format!(r"(?i)\b{l}\b(?:\s+[A-Za-z]+){{0,3}}\s*:\s*$"))?,
            extended: compile(&format!(r"(?i)\b{l}\b(?:\s+[A-Za-z]+){{0,5}}\s*:\s*(.+)"))?,
        })
    }
}

/// Cargo lookups: description labels first (wider filler window), then a
/// generic `label [:-] value` pass over every cargo label.
struct CargoPatterns {
    preferred: Vec<(Regex, Regex)>,
    generic: Vec<Regex>,
}

impl CargoPatterns {
    fn compile(labels: &[String]) -> Result<Self, ConfigError> {
        let described: Vec<&String> = labels
            .iter()
            .filter(|l| l.to_lowercase().contains("description"))
            .collect();
        let preferred_labels: Vec<&String> = if described.is_empty() {
            labels.iter().collect()
        } else {
            described
        };

        let preferred = preferred_labels
            .into_iter()
            .map(|label| -> Result<(Regex, Regex), ConfigError> {
                let l = regex::escape(label);
                Ok((
                    compile(&format!(r"(?i)\b{l}\b(?:\s+[A-Za-z]+){{0,5}}\s*[:\-]\s*(.+)"))?,
                    compile(&format!(r"(?i)\b{l}\b(?:\s+[A-Za-z]+){{0,5}}\s*:\s*$"))?,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let generic = labels
            .iter()
            .map(|label| compile(&format!(r"(?i)\b{}\b\s*[:\-]\s*(.+)", regex::escape(label))))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { preferred, generic })
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Invalid(format!("bad label pattern: {e}")))
}

fn compile_all(labels: &[String]) -> Result<Vec<LabelPatterns>, ConfigError> {
    labels.iter().map(|l| LabelPatterns::compile(l)).collect()
}

/// Extracts a `BusinessRecord` from document lines.
///
/// Label patterns are compiled once; the extractor is immutable and can be
/// shared across documents.
pub struct BusinessFieldExtractor {
    vessel: Vec<LabelPatterns>,
    voyage_from: Vec<LabelPatterns>,
    voyage_to: Vec<LabelPatterns>,
    port: Vec<LabelPatterns>,
    cargo: CargoPatterns,
}

impl BusinessFieldExtractor {
    pub fn new(labels: &BusinessLabels) -> Result<Self, ConfigError> {
        Ok(Self {
            vessel: compile_all(&labels.vessel)?,
            voyage_from: compile_all(&labels.voyage_from)?,
            voyage_to: compile_all(&labels.voyage_to)?,
            port: compile_all(&labels.port)?,
            cargo: CargoPatterns::compile(&labels.cargo)?,
        })
    }

    pub fn extract(&self, lines: &[Line]) -> BusinessRecord {
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        self.extract_texts(&texts)
    }

    /// Extract from raw line texts. Texts holding several physical lines
    /// (plaintext fallback) are split first.
    pub fn extract_texts<S: AsRef<str>>(&self, texts: &[S]) -> BusinessRecord {
        let lines: Vec<&str> = texts
            .iter()
            .flat_map(|t| t.as_ref().split('\n'))
            .map(|l| l.trim_end_matches('\r'))
            .collect();
        if lines.is_empty() {
            return BusinessRecord::default();
        }
        let joined = lines.join("\n").to_lowercase();

        let record = BusinessRecord {
            vessel: value_after_labels(&lines, &self.vessel).or_else(|| motor_vessel(&lines)),
            voyage_from: value_after_labels(&lines, &self.voyage_from),
            voyage_to: value_after_labels(&lines, &self.voyage_to),
            port: value_after_labels(&lines, &self.port),
            cargo: self.cargo(&lines),
            operation: operation(&joined),
            demurrage: first_number(&DEMURRAGE, &joined),
            dispatch: first_number(&DISPATCH, &joined),
            rate: rate(&joined),
            quantity: QUANTITY_PATTERNS
                .iter()
                .find_map(|rx| first_number(rx, &joined)),
            allowed_laytime: first_number(&ALLOWED_LAYTIME, &joined),
        };

        tracing::info!(
            lines = lines.len(),
            found = record.found_count(),
            vessel = record.vessel.is_some(),
            port = record.port.is_some(),
            cargo = record.cargo.is_some(),
            "Business fields extracted"
        );
        record
    }

    fn cargo(&self, lines: &[&str]) -> Option<String> {
        let candidates = || {
            lines
                .iter()
                .enumerate()
                .filter(|(_, line)| !PORT_OF_LOADING_OR_DISCHARGING.is_match(line))
        };

        for (idx, line) in candidates() {
            for (same_line, label_only) in &self.cargo.preferred {
                if let Some(value) = captured_value(same_line, line) {
                    return Some(value);
                }
                if label_only.is_match(line) {
                    if let Some(value) = next_value(lines, idx) {
                        return Some(value);
                    }
                }
            }
        }

        candidates().find_map(|(_, line)| {
            self.cargo
                .generic
                .iter()
                .find_map(|rx| captured_value(rx, line))
        })
    }
}

/// Value introduced by any of the labels, scanning lines outer, labels inner.
fn value_after_labels(lines: &[&str], labels: &[LabelPatterns]) -> Option<String> {
    for (idx, line) in lines.iter().enumerate() {
        for label in labels {
            if let Some(value) = captured_value(&label.same_line, line) {
                return Some(value);
            }
            if label.label_only.is_match(line) {
                if let Some(value) = next_value(lines, idx) {
                    return Some(value);
                }
            }
            if let Some(value) = captured_value(&label.extended, line) {
                return Some(value);
            }
        }
    }
    None
}

/// Cleaned first capture group, if it holds anything.
fn captured_value(rx: &Regex, line: &str) -> Option<String> {
    let raw = rx.captures(line)?.get(1)?.as_str();
    if raw.trim().is_empty() {
        return None;
    }
    let value = clean_value(raw);
    (!value.is_empty()).then_some(value)
}

/// First non-blank line among the next `LOOKAHEAD_LINES` after `idx`.
fn next_value(lines: &[&str], idx: usize) -> Option<String> {
    lines
        .iter()
        .skip(idx + 1)
        .take(LOOKAHEAD_LINES)
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(clean_value)
        .filter(|v| !v.is_empty())
}

/// Trim, drop a leading "at"/"to"/"for", collapse whitespace runs.
pub fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let unlinked = LEADING_LINK_WORD.replace(trimmed, "");
    WHITESPACE_RUN.replace_all(&unlinked, " ").trim().to_string()
}

fn motor_vessel(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .find_map(|line| MOTOR_VESSEL.find(line))
        .map(|m| clean_value(m.as_str()))
}

fn operation(joined: &str) -> Option<Operation> {
    if LOAD_WORD.is_match(joined) {
        Some(Operation::Load)
    } else if DISCHARGE_WORD.is_match(joined) {
        Some(Operation::Discharge)
    } else {
        None
    }
}

fn rate(joined: &str) -> Option<f64> {
    joined
        .split('\n')
        .filter(|line| RATE_LINE.is_match(line))
        .find_map(|line| {
            RATE_BEFORE_UNIT
                .captures(line)
                .or_else(|| RATE_AFTER_WORD.captures(line))
                .and_then(|c| c.get(1))
                .and_then(|m| parse_number(m.as_str()))
        })
}

fn first_number(rx: &Regex, text: &str) -> Option<f64> {
    let m = rx.captures(text)?.get(1)?;
    parse_number(m.as_str())
}

/// Parse a number with thousands separators; a trailing sentence period is
/// ignored. Anything else unparsable is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    cleaned.trim_end_matches('.').parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> BusinessFieldExtractor {
        BusinessFieldExtractor::new(&BusinessLabels::builtin().unwrap()).unwrap()
    }

    fn extract(lines: &[&str]) -> BusinessRecord {
        extractor().extract_texts(lines)
    }

    #[test]
    fn clean_value_strips_link_word_and_spaces() {
        assert_eq!(clean_value("  AT   KOH  SICHANG "), "KOH SICHANG");
        assert_eq!(clean_value("to Singapore"), "Singapore");
        assert_eq!(clean_value("Atlantic Star"), "Atlantic Star");
    }

    #[test]
    fn port_line_drops_leading_at() {
        let record = extract(&["Port: AT KOH SICHANG"]);
        assert_eq!(record.port.as_deref(), Some("KOH SICHANG"));
    }

    #[test]
    fn report_is_not_a_port_label() {
        let record = extract(&["Master's report: all fast at 1015", "Remarks: none"]);
        assert_eq!(record.port, None);
    }

    #[test]
    fn port_of_loading_line_is_not_cargo() {
        let record = extract(&["Port of Loading Cargo: AT KOH SICHANG"]);
        assert_ne!(record.cargo.as_deref(), Some("KOH SICHANG"));
        assert_eq!(record.cargo, None);
        assert_eq!(record.port.as_deref(), Some("KOH SICHANG"));
        assert_eq!(record.voyage_from.as_deref(), Some("KOH SICHANG"));
    }

    #[test]
    fn label_only_line_takes_next_non_blank() {
        let record = extract(&["Name of Vessel:", "", "  M.V. ORION   TRADER "]);
        assert_eq!(record.vessel.as_deref(), Some("M.V. ORION TRADER"));
    }

    #[test]
    fn label_only_lookahead_is_bounded() {
        let record = extract(&["Destination:", "", "", "", "Singapore"]);
        assert_eq!(record.voyage_to, None);
    }

    #[test]
    fn filler_words_before_colon() {
        let record = extract(&["Vessel name as per charter party: ORION TRADER"]);
        assert_eq!(record.vessel.as_deref(), Some("ORION TRADER"));
    }

    #[test]
    fn motor_vessel_fallback() {
        let record = extract(&["STATEMENT OF FACTS", "MV Orion Trader"]);
        assert_eq!(record.vessel.as_deref(), Some("MV Orion Trader"));
    }

    #[test]
    fn cargo_prefers_description_label() {
        let record = extract(&["Cargo: see below", "Description of cargo: Bulk Urea"]);
        assert_eq!(record.cargo.as_deref(), Some("Bulk Urea"));
    }

    #[test]
    fn cargo_generic_fallback() {
        let record = extract(&["Port of Discharging Cargo: Urea", "Commodity - Steel coils"]);
        assert_eq!(record.cargo.as_deref(), Some("Steel coils"));
    }

    #[test]
    fn operation_load_wins_over_discharge() {
        assert_eq!(extract(&["Commenced loading 0730"]).operation, Some(Operation::Load));
        assert_eq!(
            extract(&["Commenced discharging 0730"]).operation,
            Some(Operation::Discharge)
        );
        assert_eq!(extract(&["Anchored 2200"]).operation, None);
    }

    #[test]
    fn numeric_fields_strip_thousands_separators() {
        let record = extract(&[
            "Demurrage: USD 12,500 per day",
            "Despatch: USD 6,250.50 per day",
            "Allowed laytime: 72 hours",
            "Cargo quantity: 25,000 MT",
        ]);
        assert_eq!(record.demurrage, Some(12500.0));
        assert_eq!(record.dispatch, Some(6250.5));
        assert_eq!(record.allowed_laytime, Some(72.0));
        assert_eq!(record.quantity, Some(25000.0));
    }

    #[test]
    fn quantity_from_unit_suffix() {
        let record = extract(&["Loaded 33,000 metric tons of urea"]);
        assert_eq!(record.quantity, Some(33000.0));
    }

    #[test]
    fn quantity_with_plural_metric_tonne_unit() {
        assert_eq!(extract(&["Loaded 25,000 MTS of urea"]).quantity, Some(25000.0));
        assert_eq!(extract(&["B/L figure 33,000MTs"]).quantity, Some(33000.0));
    }

    #[test]
    fn malformed_number_is_absent() {
        let record = extract(&["Demurrage: 1.2.3"]);
        assert_eq!(record.demurrage, None);
    }

    #[test]
    fn rate_prefers_number_next_to_unit() {
        let record = extract(&["Loading rate 2024 terms: 8,000 MT/day"]);
        assert_eq!(record.rate, Some(8000.0));
    }

    #[test]
    fn rate_after_word_when_no_unit() {
        let record = extract(&["Discharge rate: 5000"]);
        assert_eq!(record.rate, Some(5000.0));
    }

    #[test]
    fn rate_does_not_leak_across_lines() {
        let record = extract(&["Loading rate as per C/P", "Date: 2024"]);
        assert_eq!(record.rate, None);
    }

    #[test]
    fn multi_line_text_is_split() {
        let record = extract(&["Vessel: ORION TRADER\nPort: KOH SICHANG\nreport: n/a"]);
        assert_eq!(record.vessel.as_deref(), Some("ORION TRADER"));
        assert_eq!(record.port.as_deref(), Some("KOH SICHANG"));
    }

    #[test]
    fn empty_input_gives_empty_record() {
        assert_eq!(extractor().extract(&[]), BusinessRecord::default());
    }

    #[test]
    fn parse_number_rules() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("8000."), Some(8000.0));
        assert_eq!(parse_number("1.2.3"), None);
    }
}
