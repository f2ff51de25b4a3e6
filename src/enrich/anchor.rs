//! Threshold anchors.
//!
//! The anchor of a metric is the earliest report date at which the metric's
//! running total, summed in ascending date order, reaches a fixed threshold.
//! Running totals only grow, so this is simply the date of first crossing.

use chrono::NaiveDate;

use crate::domain::{DAY_N_NONE, Metric};
use crate::enrich::series::DatedRecord;

/// Resolved anchor for one entity and metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    At(NaiveDate),
    /// The running total never reached the threshold. A valid terminal state.
    NotFound,
}

impl Anchor {
    /// 1-based count of calendar days since the anchor, or `-1` before/without one.
    pub fn day_n(self, date: NaiveDate) -> i64 {
        match self {
            Anchor::At(anchor) if date >= anchor => (date - anchor).num_days() + 1,
            _ => DAY_N_NONE,
        }
    }
}

/// Find the anchor of `metric` over `series`, which must be sorted ascending by date.
pub fn resolve_anchor(series: &[DatedRecord<'_>], metric: Metric, threshold: u64) -> Anchor {
    let mut running = 0u64;
    for item in series {
        running = running.saturating_add(metric.value(item.record));
        if running >= threshold {
            return Anchor::At(item.date);
        }
    }
    Anchor::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseRecord;

    fn record(cases: u64, deaths: u64) -> CaseRecord {
        CaseRecord {
            line: 0,
            date_rep: String::new(),
            cases,
            deaths,
            entity_name: "Testland".to_string(),
            entity_code: "XX".to_string(),
            country_code: "XXX".to_string(),
            population: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn series(records: &[CaseRecord]) -> Vec<DatedRecord<'_>> {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| DatedRecord {
                date: day(i as u32 + 1),
                record,
            })
            .collect()
    }

    #[test]
    fn anchor_is_first_crossing() {
        let records: Vec<_> = (0..8).map(|_| record(10, 0)).collect();
        let anchor = resolve_anchor(&series(&records), Metric::Cases, 50);
        assert_eq!(anchor, Anchor::At(day(5)));
    }

    #[test]
    fn exact_threshold_on_first_day() {
        let records = vec![record(50, 10), record(0, 0)];
        let s = series(&records);
        assert_eq!(resolve_anchor(&s, Metric::Cases, 50), Anchor::At(day(1)));
        assert_eq!(resolve_anchor(&s, Metric::Deaths, 10), Anchor::At(day(1)));
    }

    #[test]
    fn metrics_resolve_independently() {
        let records = vec![record(60, 1), record(0, 4), record(0, 5), record(0, 0)];
        let s = series(&records);
        assert_eq!(resolve_anchor(&s, Metric::Cases, 50), Anchor::At(day(1)));
        assert_eq!(resolve_anchor(&s, Metric::Deaths, 10), Anchor::At(day(3)));
    }

    #[test]
    fn never_reaching_threshold_is_not_found() {
        let records = vec![record(49, 9)];
        let s = series(&records);
        assert_eq!(resolve_anchor(&s, Metric::Cases, 50), Anchor::NotFound);
        assert_eq!(resolve_anchor(&s, Metric::Deaths, 10), Anchor::NotFound);
        assert_eq!(resolve_anchor(&[], Metric::Cases, 50), Anchor::NotFound);
    }

    #[test]
    fn day_n_counts_calendar_days() {
        let anchor = Anchor::At(day(5));
        assert_eq!(anchor.day_n(day(4)), -1);
        assert_eq!(anchor.day_n(day(5)), 1);
        assert_eq!(anchor.day_n(day(6)), 2);
        // Gaps in reporting still count calendar days.
        assert_eq!(anchor.day_n(day(20)), 16);
        assert_eq!(Anchor::NotFound.day_n(day(20)), -1);
    }
}
