//! Error taxonomy for the simulation engine.
//!
//! Requests fail in one of three ways: the payload is malformed, it breaks a
//! business rule, or a storage dependency fails. Each class carries its own
//! status so callers can tell them apart.

use thiserror::Error;

/// Storage failures from the ledger, the catalog or the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt {table} record for student {student_id}: {reason}")]
    CorruptRecord {
        table: &'static str,
        student_id: uuid::Uuid,
        reason: String,
    },

    #[error("corrupt course {course_id}: {reason}")]
    CorruptCourse { course_id: uuid::Uuid, reason: String },
}

/// Semantically incomplete input. The messages are shown to students as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessRule {
    #[error("Add at least one course to start the simulation.")]
    NoCourses,

    #[error("Fill in every grade before running the simulation (missing for '{course_name}').")]
    UngradedEntry { course_name: String },

    #[error("Grade '{grade}' for '{course_name}' is not recognized (expected one of {expected}).")]
    UnrecognizedGrade {
        course_name: String,
        grade: String,
        expected: String,
    },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Incomplete data: {reason}. Check the selected courses and grades.")]
    Malformed { reason: String },

    #[error(transparent)]
    BusinessRule(#[from] BusinessRule),

    #[error("storage unavailable: {0}")]
    Dependency(#[from] StoreError),
}

impl SimulationError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        SimulationError::Malformed {
            reason: reason.into(),
        }
    }

    /// HTTP-style status of the failure class.
    pub fn status(&self) -> u16 {
        match self {
            SimulationError::Malformed { .. } => 422,
            SimulationError::BusinessRule(_) => 400,
            SimulationError::Dependency(_) => 500,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            SimulationError::Dependency(_) => 1,
            _ => 2,
        }
    }
}
