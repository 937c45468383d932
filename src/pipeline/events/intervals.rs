use chrono::NaiveDateTime;

use super::types::{ClassifiedEvent, EventClass, Interval};

/// Pair start-class events with later end-class events into intervals.
///
/// Walks events in document order with a LIFO stack of open starts, so a
/// stop always closes the most recently opened span. Only each event's first
/// timestamp is used; events without timestamps are ignored. End events with
/// nothing open, and starts never closed, produce no interval.
pub fn pair_intervals(events: &[ClassifiedEvent]) -> Vec<Interval> {
    let mut intervals = Vec::new();
    let mut open: Vec<(&ClassifiedEvent, NaiveDateTime)> = Vec::new();
    let mut orphan_ends = 0usize;

    for event in events {
        let Some(&at) = event.timestamps.first() else {
            continue;
        };
        match EventClass::of(&event.event) {
            EventClass::Start => open.push((event, at)),
            EventClass::End => match open.pop() {
                Some((start_event, start)) => {
                    let seconds = (at - start).num_seconds() as f64;
                    intervals.push(Interval {
                        start_event: start_event.clone(),
                        end_event: event.clone(),
                        start,
                        end: at,
                        duration_hours: round4(seconds / 3600.0),
                    });
                }
                None => orphan_ends += 1,
            },
            EventClass::Neither => {}
        }
    }

    tracing::debug!(
        intervals = intervals.len(),
        unclosed_starts = open.len(),
        orphan_ends,
        "Paired event intervals"
    );
    intervals
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::types::SourceLocator;
    use crate::pipeline::layout::BoundingBox;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(label: &str, timestamps: Vec<NaiveDateTime>) -> ClassifiedEvent {
        ClassifiedEvent {
            event: label.to_string(),
            confidence: 0.9,
            raw_text: label.to_lowercase(),
            timestamps,
            source: SourceLocator {
                page: 1,
                bbox: BoundingBox::default(),
                line_no: 1,
            },
            matched_synonym: None,
        }
    }

    #[test]
    fn stop_and_resume_produce_two_spans() {
        let events = vec![
            event("COMMENCE", vec![at(7, 30)]),
            event("STOP", vec![at(12, 45)]),
            event("RESUME", vec![at(14, 10)]),
            event("COMPLETE", vec![at(18, 0)]),
        ];
        let intervals = pair_intervals(&events);

        assert_eq!(intervals.len(), 2);
        assert_eq!((intervals[0].start, intervals[0].end), (at(7, 30), at(12, 45)));
        assert_eq!(intervals[0].duration_hours, 5.25);
        assert_eq!((intervals[1].start, intervals[1].end), (at(14, 10), at(18, 0)));
        assert_eq!(intervals[1].duration_hours, 3.8333);
        assert_eq!(intervals[1].start_event.event, "RESUME");
        assert_eq!(intervals[1].end_event.event, "COMPLETE");
    }

    #[test]
    fn orphan_end_is_dropped() {
        let events = vec![
            event("STOP", vec![at(9, 0)]),
            event("COMMENCE", vec![at(10, 0)]),
            event("COMPLETE", vec![at(11, 0)]),
        ];
        let intervals = pair_intervals(&events);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, at(10, 0));
    }

    #[test]
    fn nested_starts_close_most_recent_first() {
        let events = vec![
            event("COMMENCE", vec![at(6, 0)]),
            event("RESUME", vec![at(8, 0)]),
            event("STOP", vec![at(9, 0)]),
            event("COMPLETE", vec![at(12, 0)]),
        ];
        let intervals = pair_intervals(&events);
        assert_eq!(intervals[0].start, at(8, 0));
        assert_eq!(intervals[1].start, at(6, 0));
        assert_eq!(intervals[1].duration_hours, 6.0);
    }

    #[test]
    fn events_without_timestamps_do_not_participate() {
        let events = vec![
            event("COMMENCE", vec![]),
            event("COMMENCE", vec![at(7, 0)]),
            event("BERTHED", vec![at(7, 30)]),
            event("STOP", vec![]),
            event("stopped", vec![at(8, 0), at(9, 0)]),
        ];
        let intervals = pair_intervals(&events);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, at(8, 0), "first timestamp only");
        assert_eq!(intervals[0].duration_hours, 1.0);
    }

    #[test]
    fn unclosed_start_yields_nothing() {
        assert!(pair_intervals(&[event("COMMENCE", vec![at(7, 0)])]).is_empty());
        assert!(pair_intervals(&[]).is_empty());
    }

    #[test]
    fn rounding_to_four_places() {
        assert_eq!(round4(1.0 / 3.0), 0.3333);
        assert_eq!(round4(2.0 / 3.0), 0.6667);
    }
}
