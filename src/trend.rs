use std::collections::BTreeMap;

use crate::grading::{average, calculate_stats, round2};
use crate::merge::{Overlay, OverlayEntry};
use crate::models::{Period, TrendPoint};

/// Per-period series with the running cumulative average as of each period.
/// Periods are walked in numeric order.
pub fn build_trend(overlay: &Overlay, target_period: u32) -> Vec<TrendPoint> {
    let mut groups: BTreeMap<&Period, Vec<&OverlayEntry>> = BTreeMap::new();
    for (period, entry) in overlay.iter() {
        groups.entry(period).or_default().push(entry);
    }

    let mut running_points = 0.0;
    let mut running_credit = 0u32;
    let mut trend = Vec::with_capacity(groups.len());

    for (period, entries) in groups {
        let stats = calculate_stats(
            entries
                .iter()
                .map(|entry| (entry.credit_weight, &entry.grade)),
        );
        running_points += stats.total_points;
        running_credit = running_credit.saturating_add(stats.credit_weight_taken);

        trend.push(TrendPoint {
            period: period.label(),
            period_average: stats.rounded_average(),
            cumulative_average_as_of: round2(average(running_points, running_credit)),
            is_hypothetical: period.ordinal == target_period,
        });
    }

    trend
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::grading::GradeScale;
    use crate::merge::merge;
    use crate::models::GradeRecord;

    fn record(name: &str, credit: u32, grade: &str, period: &str) -> GradeRecord {
        GradeRecord {
            student_id: Uuid::nil(),
            course_id: None,
            course_name: name.to_string(),
            credit_weight: credit,
            grade: GradeScale::default().resolve(grade).unwrap(),
            period: period.parse().unwrap(),
        }
    }

    #[test]
    fn periods_are_emitted_numerically() {
        let ledger = vec![
            record("Algorithms", 3, "A", "2"),
            record("Compilers", 3, "B", "10"),
            record("Linear Algebra", 3, "C", "3"),
        ];
        let merged = merge(&ledger, &[], 11);
        let labels: Vec<String> = build_trend(&merged.overlay, 11)
            .into_iter()
            .map(|point| point.period)
            .collect();
        assert_eq!(labels, vec!["2", "3", "10"]);
    }

    #[test]
    fn cumulative_average_runs_across_periods() {
        let ledger = vec![
            record("Algorithms", 2, "A", "1"),
            record("Physics", 2, "C", "2"),
            record("Chemistry", 4, "E", "3 (Fast Track)"),
        ];
        let merged = merge(&ledger, &[], 9);
        let trend = build_trend(&merged.overlay, 9);

        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].cumulative_average_as_of, 4.0);
        assert_eq!(trend[1].period_average, 2.0);
        assert_eq!(trend[1].cumulative_average_as_of, 3.0);
        assert_eq!(trend[2].period, "3 (Fast Track)");
        assert_eq!(trend[2].period_average, 0.0);
        assert_eq!(trend[2].cumulative_average_as_of, 1.5);
        assert!(trend.iter().all(|point| !point.is_hypothetical));
    }

    #[test]
    fn trend_is_deterministic() {
        let ledger = vec![
            record("B", 3, "B", "2"),
            record("A", 3, "A", "2"),
            record("C", 2, "AB", "1"),
        ];
        let merged = merge(&ledger, &[], 3);
        assert_eq!(build_trend(&merged.overlay, 3), build_trend(&merged.overlay, 3));
    }

    #[test]
    fn empty_overlay_yields_empty_trend() {
        assert!(build_trend(&Overlay::default(), 1).is_empty());
    }
}
