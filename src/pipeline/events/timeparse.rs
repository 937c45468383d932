//! Clock-time extraction from free text.
//!
//! Ranges (`23:50-00:10`, `23.50-00.10`, `2350-0010`) are matched first and
//! their spans recorded; single times (`07:30`, `07.30`, `0730`) are then
//! kept only when they do not overlap a recorded range. A range whose end is
//! not after its start rolls the end to the next day; a range that cannot
//! roll (the base date is the last representable one) is dropped.

use std::sync::LazyLock;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

static RANGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b(?P<sh>\d{2}):(?P<sm>\d{2})-(?P<eh>\d{2}):(?P<em>\d{2})\b").expect("valid regex"),
        Regex::new(r"\b(?P<sh>\d{2})\.(?P<sm>\d{2})-(?P<eh>\d{2})\.(?P<em>\d{2})\b").expect("valid regex"),
        Regex::new(r"\b(?P<sh>\d{2})(?P<sm>\d{2})-(?P<eh>\d{2})(?P<em>\d{2})\b").expect("valid regex"),
    ]
});

static POINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b(?P<h>\d{2})(?P<m>\d{2})\b").expect("valid regex"),
        Regex::new(r"\b(?P<h>\d{2})\.(?P<m>\d{2})\b").expect("valid regex"),
        Regex::new(r"\b(?P<h>\d{2}):(?P<m>\d{2})\b").expect("valid regex"),
    ]
});

/// Extracts timestamps anchored on a base date.
#[derive(Debug, Clone, Default)]
pub struct TimeExtractor {
    base_date: Option<NaiveDate>,
}

impl TimeExtractor {
    /// `None` anchors times on the current local date at call time.
    pub fn new(base_date: Option<NaiveDate>) -> Self {
        Self { base_date }
    }

    /// Timestamps in text order. Ranges contribute start then end.
    pub fn extract(&self, text: &str) -> Vec<NaiveDateTime> {
        if text.is_empty() {
            return Vec::new();
        }
        let base = self.base_date.unwrap_or_else(|| Local::now().date_naive());

        // (span start, timestamp); sorted at the end, stable for range pairs.
        let mut found: Vec<(usize, NaiveDateTime)> = Vec::new();
        let mut covered: Vec<(usize, usize)> = Vec::new();

        for rx in RANGE_PATTERNS.iter() {
            for caps in rx.captures_iter(text) {
                let (Some(start), Some(end)) =
                    (at(base, &caps, "sh", "sm"), at(base, &caps, "eh", "em"))
                else {
                    continue;
                };
                let Some(m) = caps.get(0) else { continue };
                covered.push((m.start(), m.end()));
                // Rolling past the last representable date drops the range.
                let end = if end <= start {
                    match end.checked_add_signed(Duration::days(1)) {
                        Some(next_day) => next_day,
                        None => continue,
                    }
                } else {
                    end
                };
                found.push((m.start(), start));
                found.push((m.start(), end));
            }
        }

        for rx in POINT_PATTERNS.iter() {
            for caps in rx.captures_iter(text) {
                let Some(m) = caps.get(0) else { continue };
                if overlaps((m.start(), m.end()), &covered) {
                    continue;
                }
                if let Some(ts) = at(base, &caps, "h", "m") {
                    found.push((m.start(), ts));
                }
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, ts)| ts).collect()
    }
}

/// Two spans overlap unless one ends at or before the other starts.
fn overlaps(span: (usize, usize), covered: &[(usize, usize)]) -> bool {
    let (a0, a1) = span;
    covered.iter().any(|&(s0, s1)| !(a1 <= s0 || a0 >= s1))
}

/// Build `base` at hh:mm from two named groups; `None` for invalid clock values.
fn at(base: NaiveDate, caps: &Captures<'_>, hour: &str, minute: &str) -> Option<NaiveDateTime> {
    let h: u32 = caps.name(hour)?.as_str().parse().ok()?;
    let m: u32 = caps.name(minute)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(h, m, 0).map(|t| base.and_time(t))
}
