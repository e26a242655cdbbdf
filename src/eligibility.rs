//! Eligibility gates applied before anything is written.
//!
//! These checks are the fast path; the unique indexes in the evaluation
//! schema remain the final arbiter when concurrent writers race past
//! the same check.

use chrono::NaiveDate;

use crate::error::{ConflictKind, EngineError, Result};
use crate::models::{Answer, Channel, NewAssignment};
use crate::store::EvaluationStore;
use uuid::Uuid;

/// At most one non-deleted instance per (channel, period). The conflict
/// carries the existing id so callers can offer "edit" instead of
/// "create".
pub async fn check_new_instance(
    store: &dyn EvaluationStore,
    channel: Channel,
    period_id: i32,
) -> Result<()> {
    if let Some(existing) = store.instance_for(channel, period_id).await? {
        return Err(ConflictKind::DuplicateInstance {
            existing: existing.id,
        }
        .into());
    }
    Ok(())
}

/// Temporal rules, evaluated against the caller's calendar day rather
/// than the wall clock so the rule stays deterministic.
pub fn check_assignment_dates(new: &NewAssignment, today: NaiveDate) -> Result<()> {
    if new.effective_date < today {
        return Err(ConflictKind::StaleDate {
            effective: new.effective_date,
        }
        .into());
    }
    if let (Some(starts_at), Some(ends_at)) = (new.starts_at, new.ends_at) {
        if ends_at <= starts_at {
            return Err(EngineError::Validation(format!(
                "evaluation window must end after it starts ({starts_at} to {ends_at})"
            )));
        }
    }
    Ok(())
}

pub async fn check_new_assignment(
    store: &dyn EvaluationStore,
    new: &NewAssignment,
    today: NaiveDate,
) -> Result<()> {
    if new.evaluator_cedula == new.evaluated_cedula {
        return Err(ConflictKind::SelfEvaluation {
            cedula: new.evaluator_cedula.clone(),
        }
        .into());
    }
    check_assignment_dates(new, today)?;

    // A NULL subject and a subject-specific grant for the same pair are
    // distinct; only the exact tuple collides.
    if let Some(existing) = store
        .find_assignment(
            new.period_id,
            &new.evaluator_cedula,
            &new.evaluated_cedula,
            new.subject_id,
        )
        .await?
    {
        return Err(ConflictKind::DuplicateAssignment {
            existing: existing.id,
        }
        .into());
    }
    Ok(())
}

/// A response group is accepted once per (instance, evaluator,
/// assignment); resubmission is rejected unless the caller explicitly
/// takes the edit path, which replaces rather than appends.
pub async fn check_submission(
    store: &dyn EvaluationStore,
    instance_id: Uuid,
    evaluator_key: &str,
    assignment_id: i64,
    edit: bool,
) -> Result<()> {
    if edit {
        return Ok(());
    }
    if store
        .has_submission(instance_id, evaluator_key, assignment_id)
        .await?
    {
        return Err(ConflictKind::AlreadyEvaluated {
            evaluator_key: evaluator_key.to_string(),
            assignment_id,
        }
        .into());
    }
    Ok(())
}

/// Malformed input is rejected before any store access.
pub fn validate_answers(evaluator_key: &str, answers: &[Answer]) -> Result<()> {
    if evaluator_key.trim().is_empty() {
        return Err(EngineError::Validation(
            "evaluator key must not be empty".to_string(),
        ));
    }
    if answers.is_empty() {
        return Err(EngineError::Validation(
            "a submission needs at least one answer".to_string(),
        ));
    }
    for answer in answers {
        if !(0.0..=5.0).contains(&answer.value) {
            return Err(EngineError::Validation(format!(
                "answer to question {} is outside the 0-5 scale: {}",
                answer.question_id, answer.value
            )));
        }
    }
    Ok(())
}
