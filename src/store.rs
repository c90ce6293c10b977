//! Storage contracts the engine depends on.
//!
//! The Postgres backend in `db` implements all of them; tests use the
//! in-memory backend below.

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    CachedSummary, CourseMeta, GradeRecord, SimulatedCourseEntry, SimulationSession, Track,
};

/// Read-only access to finalized grades.
pub trait GradeLedger {
    async fn grades_for(&self, student_id: Uuid) -> Result<Vec<GradeRecord>, StoreError>;
}

/// Course catalog lookup used to prefill a simulation.
pub trait CourseCatalog {
    async fn default_plan(
        &self,
        semester: u32,
        track: Track,
    ) -> Result<Vec<CourseMeta>, StoreError>;
}

/// One resumable simulation per student.
///
/// `save_or_replace` must be a single atomic write keyed by student: two
/// concurrent saves leave exactly one of them, never a mix.
pub trait SessionStore {
    async fn save_or_replace(
        &self,
        student_id: Uuid,
        target_period: u32,
        track: Track,
        entries: &[SimulatedCourseEntry],
        summary: &CachedSummary,
    ) -> Result<SimulationSession, StoreError>;

    /// Returns whether a session was removed; a missing session is not an error.
    async fn end_session(&self, student_id: Uuid) -> Result<bool, StoreError>;

    async fn get(&self, student_id: Uuid) -> Result<Option<SimulationSession>, StoreError>;
}
