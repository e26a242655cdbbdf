//! Error taxonomy for the evaluation engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the public engine operations. "No data" outcomes
/// (a teacher with no responses, an empty breakdown) are typed values,
/// never errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, rejected before any store access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness or eligibility rule was violated. Carries the
    /// conflicting row so callers can offer an edit path instead.
    #[error(transparent)]
    Conflict(#[from] ConflictKind),

    /// A referenced teacher, period or instance does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The underlying data store failed. Never retried by the engine.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConflictKind {
    #[error("an active instance already exists for this channel and period ({existing})")]
    DuplicateInstance { existing: Uuid },

    #[error("an identical peer assignment already exists ({existing})")]
    DuplicateAssignment { existing: Uuid },

    #[error("teacher {cedula} cannot peer-evaluate themselves")]
    SelfEvaluation { cedula: String },

    #[error("{evaluator_key} already submitted responses for assignment {assignment_id}")]
    AlreadyEvaluated {
        evaluator_key: String,
        assignment_id: i64,
    },

    #[error("assignment effective date {effective} is already in the past")]
    StaleDate { effective: chrono::NaiveDate },
}

impl EngineError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            key: key.into(),
        }
    }
}
