use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A letter grade resolved against the scale. The grade-point is fixed at
/// resolution time and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub label: String,
    pub points: f64,
    pub passing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeScale {
    grades: Vec<Grade>,
}

impl Default for GradeScale {
    fn default() -> Self {
        let table = [
            ("A", 4.0, true),
            ("AB", 3.5, true),
            ("B", 3.0, true),
            ("BC", 2.5, true),
            ("C", 2.0, true),
            ("D", 1.0, true),
            ("E", 0.0, false),
            // incomplete / withdrawn
            ("T", 0.0, false),
        ];
        Self {
            grades: table
                .into_iter()
                .map(|(label, points, passing)| Grade {
                    label: label.to_string(),
                    points,
                    passing,
                })
                .collect(),
        }
    }
}

impl GradeScale {
    pub fn new(grades: Vec<Grade>) -> anyhow::Result<Self> {
        anyhow::ensure!(!grades.is_empty(), "grade scale must define at least one grade");
        for (index, grade) in grades.iter().enumerate() {
            anyhow::ensure!(
                !grade.label.trim().is_empty(),
                "grade #{index} has an empty label"
            );
            anyhow::ensure!(
                grade.points.is_finite() && grade.points >= 0.0,
                "grade '{}' has invalid points {}",
                grade.label,
                grade.points
            );
            let duplicate = grades[..index]
                .iter()
                .any(|other| other.label.trim().eq_ignore_ascii_case(grade.label.trim()));
            anyhow::ensure!(!duplicate, "grade '{}' is defined twice", grade.label);
        }
        Ok(Self { grades })
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grade scale {}", path.display()))?;
        let grades: Vec<Grade> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid grade scale in {}", path.display()))?;
        Self::new(grades)
    }

    pub fn resolve(&self, label: &str) -> Option<Grade> {
        let wanted = label.trim();
        self.grades
            .iter()
            .find(|grade| grade.label.trim().eq_ignore_ascii_case(wanted))
            .cloned()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.grades.iter().map(|grade| grade.label.as_str()).collect()
    }
}

/// Largest credit weight a single course may carry.
pub const MAX_CREDIT_WEIGHT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateStats {
    pub credit_weight_taken: u32,
    pub credit_weight_passed: u32,
    pub total_points: f64,
    pub average: f64,
}

impl AggregateStats {
    pub fn rounded_average(&self) -> f64 {
        round2(self.average)
    }
}

/// Weighted grade-point average over `(credit weight, grade)` pairs.
/// Zero total credit yields an average of 0.
pub fn calculate_stats<'a, I>(pairs: I) -> AggregateStats
where
    I: IntoIterator<Item = (u32, &'a Grade)>,
{
    let mut stats = AggregateStats::default();

    for (credit_weight, grade) in pairs {
        stats.credit_weight_taken = stats.credit_weight_taken.saturating_add(credit_weight);
        stats.total_points += f64::from(credit_weight) * grade.points;
        if grade.passing {
            stats.credit_weight_passed = stats.credit_weight_passed.saturating_add(credit_weight);
        }
    }

    stats.average = average(stats.total_points, stats.credit_weight_taken);
    stats
}

pub fn average(total_points: f64, credit_weight: u32) -> f64 {
    if credit_weight == 0 {
        0.0
    } else {
        total_points / f64::from(credit_weight)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
