use std::fmt::Write;

use crate::models::{SimulationResult, Student, TrendPoint, Track};

/// Largest period-to-period change in cumulative average, if any.
pub fn steepest_change(trend: &[TrendPoint]) -> Option<(&TrendPoint, f64)> {
    trend
        .windows(2)
        .map(|pair| (&pair[1], pair[1].cumulative_average_as_of - pair[0].cumulative_average_as_of))
        .max_by(|a, b| {
            a.1.abs()
                .partial_cmp(&b.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

pub fn build_report(
    student: &Student,
    target_period: u32,
    track: Track,
    result: &SimulationResult,
) -> String {
    let mut output = String::new();
    let period = &result.period_stats;
    let cumulative = &result.cumulative_stats;

    let _ = writeln!(output, "# Academic Simulation Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}), semester {} on the {} track",
        student.full_name, student.nim, target_period, track
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Simulated Semester");
    let _ = writeln!(
        output,
        "- Semester average: {:.2}",
        period.period_average
    );
    let _ = writeln!(
        output,
        "- Credits taken: {} (passed {})",
        period.credit_weight_taken, period.credit_weight_passed
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cumulative");
    let _ = writeln!(
        output,
        "- Cumulative average: {:.2}",
        cumulative.cumulative_average
    );
    let _ = writeln!(
        output,
        "- Credits taken: {} (passed {})",
        cumulative.total_credit_weight_taken, cumulative.total_credit_weight_passed
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");

    if result.trend.is_empty() {
        let _ = writeln!(output, "No semesters recorded yet.");
    } else {
        let _ = writeln!(output, "| Semester | Semester average | Cumulative average |");
        let _ = writeln!(output, "|---|---|---|");
        for point in &result.trend {
            let marker = if point.is_hypothetical { " (simulated)" } else { "" };
            let _ = writeln!(
                output,
                "| {}{} | {:.2} | {:.2} |",
                point.period, marker, point.period_average, point.cumulative_average_as_of
            );
        }
    }

    if let Some((point, delta)) = steepest_change(&result.trend) {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Largest cumulative change: {:+.2} in semester {}.",
            delta, point.period
        );
    }

    output
}
