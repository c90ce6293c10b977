use std::collections::BTreeMap;

use crate::grading::{calculate_stats, AggregateStats, Grade};
use crate::models::{CourseKey, GradeRecord, Period, SimulatedCourse};

#[derive(Debug, Clone)]
pub struct OverlayEntry {
    pub course_name: String,
    pub credit_weight: u32,
    pub grade: Grade,
    pub hypothetical: bool,
}

/// Course set after the simulated period has been laid over the ledger,
/// ordered by period then course key.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: BTreeMap<(Period, CourseKey), OverlayEntry>,
}

impl Overlay {
    pub fn insert_historical(&mut self, record: &GradeRecord) {
        self.entries.insert(
            (record.period.clone(), CourseKey::new(&record.course_name)),
            OverlayEntry {
                course_name: record.course_name.clone(),
                credit_weight: record.credit_weight,
                grade: record.grade.clone(),
                hypothetical: false,
            },
        );
    }

    /// Inserts a simulated course, superseding every historical attempt of the
    /// same course and any earlier simulated entry with the same key.
    pub fn insert_simulated(&mut self, period: &Period, course: &SimulatedCourse) {
        let superseded: Vec<(Period, CourseKey)> = self
            .entries
            .iter()
            .filter(|((_, key), entry)| key == &course.key && !entry.hypothetical)
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in superseded {
            if let Some(previous) = self.entries.remove(&slot) {
                log::debug!(
                    "simulated {} supersedes {} from period {}",
                    course.course_name,
                    previous.course_name,
                    slot.0
                );
            }
        }
        self.entries.insert(
            (period.clone(), course.key.clone()),
            OverlayEntry {
                course_name: course.course_name.clone(),
                credit_weight: course.credit_weight,
                grade: course.grade.clone(),
                hypothetical: true,
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Period, &OverlayEntry)> {
        self.entries.iter().map(|((period, _), entry)| (period, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> AggregateStats {
        calculate_stats(
            self.entries
                .values()
                .map(|entry| (entry.credit_weight, &entry.grade)),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub overlay: Overlay,
    pub simulated: Vec<SimulatedCourse>,
    pub period: AggregateStats,
    pub cumulative: AggregateStats,
}

/// Period statistics cover every simulated course as submitted. Inside the
/// overlay a repeated course key keeps only its last entry.
pub fn merge(ledger: &[GradeRecord], courses: &[SimulatedCourse], target_period: u32) -> Merged {
    let target = Period::new(target_period);
    let simulated = courses.to_vec();
    let mut overlay = Overlay::default();

    for record in ledger
        .iter()
        .filter(|record| record.period.ordinal != target_period)
    {
        overlay.insert_historical(record);
    }
    for course in &simulated {
        overlay.insert_simulated(&target, course);
    }

    let period = calculate_stats(
        simulated
            .iter()
            .map(|course| (course.credit_weight, &course.grade)),
    );
    let cumulative = overlay.stats();

    log::debug!(
        "merged {} ledger records with {} simulated courses into {} overlay entries",
        ledger.len(),
        simulated.len(),
        overlay.len()
    );

    Merged {
        overlay,
        simulated,
        period,
        cumulative,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::grading::GradeScale;

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

    fn course(name: &str, credit: u32, grade: &str) -> SimulatedCourse {
        SimulatedCourse {
            key: CourseKey::new(name),
            course_name: name.to_string(),
            credit_weight: credit,
            grade: GradeScale::default().resolve(grade).unwrap(),
        }
    }

    #[test]
    fn simulated_entry_overrides_same_period_record() {
        let ledger = vec![
            record("Databases", 3, "B", "5"),
            record("Calculus II", 4, "B", "4"),
        ];
        let merged = merge(&ledger, &[course("Databases", 3, "A")], 5);

        assert_eq!(merged.cumulative.credit_weight_taken, 7);
        assert!((merged.cumulative.average - (12.0 + 12.0) / 7.0).abs() < 1e-9);
        let databases: Vec<_> = merged
            .overlay
            .iter()
            .filter(|(_, entry)| entry.course_name == "Databases")
            .collect();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].1.grade.label, "A");
    }

    #[test]
    fn qualified_target_period_records_are_dropped() {
        let ledger = vec![record("Ethics", 2, "C", "5 (Fast Track)")];
        let merged = merge(&ledger, &[course("Networks", 3, "A")], 5);
        assert_eq!(merged.cumulative.credit_weight_taken, 3);
    }

    #[test]
    fn simulated_retake_supersedes_earlier_attempt() {
        let ledger = vec![record("Statistics", 3, "D", "2")];
        let merged = merge(&ledger, &[course("statistics ", 3, "B")], 5);
        assert_eq!(merged.overlay.len(), 1);
        assert_eq!(merged.cumulative.credit_weight_taken, 3);
        assert!((merged.cumulative.average - 3.0).abs() < 1e-9);
    }

    #[test]
    fn historical_repeats_across_periods_are_kept() {
        let ledger = vec![
            record("Statistics", 3, "E", "2"),
            record("Statistics", 3, "B", "3"),
        ];
        let merged = merge(&ledger, &[course("Networks", 3, "A")], 5);
        assert_eq!(merged.cumulative.credit_weight_taken, 9);
        assert_eq!(merged.cumulative.credit_weight_passed, 6);
    }

    #[test]
    fn duplicate_simulated_names_count_in_period_but_not_twice_cumulatively() {
        let merged = merge(
            &[],
            &[course("Networks", 3, "C"), course("networks", 3, "A")],
            5,
        );
        assert_eq!(merged.simulated.len(), 2);
        assert_eq!(merged.period.credit_weight_taken, 6);
        assert!((merged.period.average - 3.0).abs() < 1e-9);

        assert_eq!(merged.overlay.len(), 1);
        assert_eq!(merged.cumulative.credit_weight_taken, 3);
        assert!((merged.cumulative.average - 4.0).abs() < 1e-9);
    }
}
