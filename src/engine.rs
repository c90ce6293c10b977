use serde_json::Value;
use uuid::Uuid;

use crate::error::SimulationError;
use crate::grading::{AggregateStats, GradeScale};
use crate::merge::merge;
use crate::models::{
    CachedSummary, CalculateRequest, CourseMeta, CumulativeStats, GradeRecord, PeriodStats,
    SimulatedCourseEntry, SimulationResult, SimulationSession, Track,
};
use crate::store::{CourseCatalog, GradeLedger, SessionStore};
use crate::trend::build_trend;
use crate::validate::validate_request;

/// Result of a calculation before it is persisted.
#[derive(Debug, Clone)]
pub struct Simulated {
    pub result: SimulationResult,
    pub summary: CachedSummary,
    pub entries: Vec<SimulatedCourseEntry>,
}

/// Merges the ledger with a validated request and builds the trend. Pure.
pub fn simulate(ledger: &[GradeRecord], request: &CalculateRequest) -> Simulated {
    let merged = merge(ledger, &request.courses, request.target_period);
    let trend = build_trend(&merged.overlay, request.target_period);

    let result = SimulationResult {
        period_stats: period_stats(&merged.period),
        cumulative_stats: cumulative_stats(&merged.cumulative),
        trend,
    };
    let summary = CachedSummary {
        period_average: result.period_stats.period_average,
        cumulative_average: result.cumulative_stats.cumulative_average,
        credit_weight_taken: result.period_stats.credit_weight_taken,
        credit_weight_passed: result.period_stats.credit_weight_passed,
    };
    let entries = merged.simulated.iter().map(|course| course.to_entry()).collect();

    Simulated {
        result,
        summary,
        entries,
    }
}

fn period_stats(stats: &AggregateStats) -> PeriodStats {
    PeriodStats {
        credit_weight_taken: stats.credit_weight_taken,
        credit_weight_passed: stats.credit_weight_passed,
        period_average: stats.rounded_average(),
    }
}

fn cumulative_stats(stats: &AggregateStats) -> CumulativeStats {
    CumulativeStats {
        total_credit_weight_taken: stats.credit_weight_taken,
        total_credit_weight_passed: stats.credit_weight_passed,
        cumulative_average: stats.rounded_average(),
    }
}

/// A persisted calculation together with the period and track it was run for.
#[derive(Debug, Clone)]
pub struct Calculation {
    pub target_period: u32,
    pub track: Track,
    pub result: SimulationResult,
}

pub struct SimulationEngine<B> {
    backend: B,
    scale: GradeScale,
}

impl<B> SimulationEngine<B>
where
    B: GradeLedger + SessionStore + CourseCatalog,
{
    pub fn new(backend: B, scale: GradeScale) -> Self {
        Self { backend, scale }
    }

    /// Validates the payload, runs the simulation and replaces the student's
    /// session. Nothing is read or written when validation fails.
    pub async fn calculate(
        &self,
        student_id: Uuid,
        payload: &Value,
    ) -> Result<Calculation, SimulationError> {
        let request = validate_request(payload, &self.scale)?;
        let ledger = self.backend.grades_for(student_id).await?;
        let simulated = simulate(&ledger, &request);

        self.backend
            .save_or_replace(
                student_id,
                request.target_period,
                request.track,
                &simulated.entries,
                &simulated.summary,
            )
            .await?;

        log::info!(
            "simulated period {} ({}) for student {}: period average {:.2}, cumulative {:.2}",
            request.target_period,
            request.track,
            student_id,
            simulated.summary.period_average,
            simulated.summary.cumulative_average
        );

        Ok(Calculation {
            target_period: request.target_period,
            track: request.track,
            result: simulated.result,
        })
    }

    pub async fn default_plan(
        &self,
        semester: u32,
        track: Track,
    ) -> Result<Vec<CourseMeta>, SimulationError> {
        if semester == 0 {
            return Err(SimulationError::malformed("semester must be a positive integer"));
        }
        Ok(self.backend.default_plan(semester, track).await?)
    }

    pub async fn end_session(&self, student_id: Uuid) -> Result<(), SimulationError> {
        let removed = self.backend.end_session(student_id).await?;
        if removed {
            log::info!("ended simulation session for student {student_id}");
        } else {
            log::debug!("no simulation session to end for student {student_id}");
        }
        Ok(())
    }

    pub async fn resume(
        &self,
        student_id: Uuid,
    ) -> Result<Option<SimulationSession>, SimulationError> {
        Ok(self.backend.get(student_id).await?)
    }
}
