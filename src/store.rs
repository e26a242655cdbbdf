//! Repository seams over the two data stores.
//!
//! The engine never issues raw SQL from its components; it depends on
//! these traits so the aggregation logic can be exercised against
//! in-memory fakes. Postgres implementations live in `db`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AuthorityScore, Channel, EvaluationInstance, NewAssignment, PeerAssignment, Period,
    ResponseRow, TeachingAssignment,
};

/// Read-only view of the institutional academic record store: teacher
/// identity, teaching assignments and enrollment facts per period.
#[async_trait]
pub trait AcademicStore: Send + Sync {
    async fn period(&self, period_id: i32) -> Result<Option<Period>>;

    /// Every teaching-assignment row for the period. This is the input
    /// for cedula reconciliation: one person may hold several rows.
    async fn assignments_for_period(&self, period_id: i32) -> Result<Vec<TeachingAssignment>>;

    /// Number of (enrolled student, teaching assignment) pairs in the
    /// period; the expected-count denominator for the student channel.
    async fn enrollment_pair_count(&self, period_id: i32) -> Result<i64>;
}

/// The local evaluation store, system of record for instances,
/// responses, peer assignments and authority scores.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn instance(&self, instance_id: Uuid) -> Result<Option<EvaluationInstance>>;

    /// The non-deleted instance for (channel, period), if one exists.
    async fn instance_for(&self, channel: Channel, period_id: i32)
        -> Result<Option<EvaluationInstance>>;

    async fn insert_instance(&self, channel: Channel, period_id: i32)
        -> Result<EvaluationInstance>;

    async fn mark_instance_completed(&self, instance_id: Uuid) -> Result<()>;

    async fn responses_for_instance(&self, instance_id: Uuid) -> Result<Vec<ResponseRow>>;

    /// Whether a done response group exists for this tuple.
    async fn has_submission(
        &self,
        instance_id: Uuid,
        evaluator_key: &str,
        assignment_id: i64,
    ) -> Result<bool>;

    /// Replace the response groups covered by `rows`: re-submission
    /// overwrites the whole (instance, evaluator, assignment) group,
    /// never duplicates it and never leaves stale answers behind.
    async fn upsert_responses(&self, rows: &[ResponseRow]) -> Result<()>;

    /// Number of done (evaluator, assignment) groups for the instance.
    async fn completed_group_count(&self, instance_id: Uuid) -> Result<i64>;

    /// Distinct evaluator keys that have submitted for the instance.
    async fn submitted_evaluator_keys(&self, instance_id: Uuid) -> Result<Vec<String>>;

    /// Exact-tuple lookup; a NULL subject only matches a NULL subject.
    async fn find_assignment(
        &self,
        period_id: i32,
        evaluator_cedula: &str,
        evaluated_cedula: &str,
        subject_id: Option<i32>,
    ) -> Result<Option<PeerAssignment>>;

    async fn insert_assignment(&self, new: &NewAssignment) -> Result<PeerAssignment>;

    /// Declared peer-assignment rows in the period; the expected-count
    /// denominator for the peer channel.
    async fn assignment_count(&self, period_id: i32) -> Result<i64>;

    /// Insert or replace the active score for (period, teacher,
    /// authority).
    async fn upsert_authority_score(
        &self,
        period_id: i32,
        teacher_cedula: &str,
        authority_key: &str,
        score: f64,
    ) -> Result<AuthorityScore>;

    /// Active (not soft-deleted) authority scores for the period.
    async fn authority_scores(&self, period_id: i32) -> Result<Vec<AuthorityScore>>;

    /// Soft-delete one authority score.
    async fn delete_authority_score(&self, id: Uuid) -> Result<()>;
}
