//! The reporting facade: the only surface collaborators call.
//!
//! Writes go through the eligibility gates, reads go through the TTL
//! caches, and every score is recomputed from persisted data on a miss.
//! Nothing is accumulated in memory, so concurrent readers at worst
//! observe a value computed before a concurrent write landed.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::eligibility;
use crate::error::{EngineError, Result};
use crate::models::{
    Answer, AuthorityScore, Channel, ChannelScores, EvaluationInstance, NewAssignment,
    ParticipationReport, PeerAssignment, PeriodResults, ResponseRow, TeacherComposite,
    TeacherResult,
};
use crate::participation::{self, ChannelCountSet, ChannelCounts};
use crate::scoring::{self, round2, TeacherIndex};
use crate::store::{AcademicStore, EvaluationStore};

/// Dashboard aggregates go stale quickly; lookups like period names
/// barely change.
const AGGREGATE_TTL: Duration = Duration::from_secs(60);
const LOOKUP_TTL: Duration = Duration::from_secs(600);

/// A teacher who has not yet submitted their self-evaluation.
#[derive(Debug, Clone)]
pub struct PendingSelfEvaluation {
    pub cedula: String,
    pub teacher_name: String,
}

pub struct Engine {
    academic: Arc<dyn AcademicStore>,
    evals: Arc<dyn EvaluationStore>,
    composite_cache: TtlCache<TeacherComposite>,
    participation_cache: TtlCache<ParticipationReport>,
    results_cache: TtlCache<PeriodResults>,
    period_cache: TtlCache<String>,
}

impl Engine {
    pub fn new(academic: Arc<dyn AcademicStore>, evals: Arc<dyn EvaluationStore>) -> Self {
        Self::with_ttls(academic, evals, AGGREGATE_TTL, LOOKUP_TTL)
    }

    pub fn with_ttls(
        academic: Arc<dyn AcademicStore>,
        evals: Arc<dyn EvaluationStore>,
        aggregate_ttl: Duration,
        lookup_ttl: Duration,
    ) -> Self {
        Self {
            academic,
            evals,
            composite_cache: TtlCache::new(aggregate_ttl),
            participation_cache: TtlCache::new(aggregate_ttl),
            results_cache: TtlCache::new(aggregate_ttl),
            period_cache: TtlCache::new(lookup_ttl),
        }
    }

    /// Writes need an existing, still-active period; closed periods are
    /// immutable once evaluations reference them.
    async fn require_active_period(&self, period_id: i32) -> Result<()> {
        let period = self
            .academic
            .period(period_id)
            .await?
            .ok_or_else(|| EngineError::not_found("period", period_id.to_string()))?;
        if !period.active {
            return Err(EngineError::Validation(format!(
                "period {} ({}) is closed",
                period.id, period.name
            )));
        }
        Ok(())
    }

    /// Display name for reports. A missing row degrades to a
    /// placeholder; it never aborts an aggregate.
    async fn period_name(&self, period_id: i32) -> Result<String> {
        let key = format!("period:{period_id}");
        if let Some(name) = self.period_cache.get(&key) {
            return Ok(name);
        }
        let name = match self.academic.period(period_id).await? {
            Some(period) => period.name,
            None => format!("period {period_id}"),
        };
        self.period_cache.set(key, name.clone());
        Ok(name)
    }

    pub async fn create_instance(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<EvaluationInstance> {
        self.require_active_period(period_id).await?;
        eligibility::check_new_instance(self.evals.as_ref(), channel, period_id).await?;
        let instance = self.evals.insert_instance(channel, period_id).await?;
        info!(
            channel = instance.channel.as_str(),
            period_id = instance.period_id,
            instance_id = %instance.id,
            "evaluation instance created"
        );
        Ok(instance)
    }

    pub async fn create_assignment(
        &self,
        new: NewAssignment,
        today: NaiveDate,
    ) -> Result<PeerAssignment> {
        self.require_active_period(new.period_id).await?;
        eligibility::check_new_assignment(self.evals.as_ref(), &new, today).await?;
        let assignment = self.evals.insert_assignment(&new).await?;
        info!(
            assignment_id = %assignment.id,
            period_id = assignment.period_id,
            evaluator = %assignment.evaluator_cedula,
            evaluated = %assignment.evaluated_cedula,
            "peer assignment created"
        );
        Ok(assignment)
    }

    /// Persist one evaluator's response batch for one subject. The
    /// instance moves pending -> completed once the batch is stored.
    pub async fn submit_responses(
        &self,
        instance_id: Uuid,
        evaluator_key: &str,
        assignment_id: i64,
        answers: &[Answer],
        edit: bool,
    ) -> Result<()> {
        eligibility::validate_answers(evaluator_key, answers)?;

        let instance = self
            .evals
            .instance(instance_id)
            .await?
            .filter(|i| !i.deleted)
            .ok_or_else(|| EngineError::not_found("instance", instance_id.to_string()))?;

        eligibility::check_submission(
            self.evals.as_ref(),
            instance.id,
            evaluator_key,
            assignment_id,
            edit,
        )
        .await?;

        let rows: Vec<ResponseRow> = answers
            .iter()
            .map(|answer| ResponseRow {
                instance_id: instance.id,
                evaluator_key: evaluator_key.to_string(),
                assignment_id,
                question_id: answer.question_id,
                value: answer.value,
            })
            .collect();

        self.evals.upsert_responses(&rows).await?;
        self.evals.mark_instance_completed(instance.id).await?;
        info!(
            instance_id = %instance.id,
            evaluator = evaluator_key,
            assignment_id,
            answers = answers.len(),
            edit,
            "responses stored"
        );
        Ok(())
    }

    pub async fn set_authority_score(
        &self,
        period_id: i32,
        cedula: &str,
        authority_key: &str,
        score: f64,
    ) -> Result<AuthorityScore> {
        if !(0.0..=100.0).contains(&score) {
            return Err(EngineError::Validation(format!(
                "authority score is outside the 0-100 scale: {score}"
            )));
        }
        self.require_active_period(period_id).await?;
        let assignments = self.academic.assignments_for_period(period_id).await?;
        let index = TeacherIndex::from_assignments(&assignments);
        if !index.contains(cedula) {
            return Err(EngineError::not_found("teacher", cedula));
        }
        let stored = self
            .evals
            .upsert_authority_score(period_id, cedula, authority_key, score)
            .await?;
        info!(
            score_id = %stored.id,
            period_id,
            teacher = cedula,
            authority = authority_key,
            score,
            "authority score recorded"
        );
        Ok(stored)
    }

    pub async fn remove_authority_score(&self, id: Uuid) -> Result<()> {
        self.evals.delete_authority_score(id).await
    }

    async fn channel_rows(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<Option<Vec<ResponseRow>>> {
        match self.evals.instance_for(channel, period_id).await? {
            Some(instance) => Ok(Some(self.evals.responses_for_instance(instance.id).await?)),
            None => Ok(None),
        }
    }

    fn score_teacher(
        index: &TeacherIndex,
        cedula: &str,
        self_rows: Option<&[ResponseRow]>,
        student_rows: Option<&[ResponseRow]>,
        peer_rows: Option<&[ResponseRow]>,
        authority: &[AuthorityScore],
    ) -> (ChannelScores, Option<f64>) {
        let ids = index.assignment_ids(cedula);
        let raw = ChannelScores {
            self_eval: self_rows.and_then(|rows| scoring::channel_average(rows, ids)),
            student: student_rows.and_then(|rows| scoring::channel_average(rows, ids)),
            peer: peer_rows.and_then(|rows| scoring::channel_average(rows, ids)),
            authority: scoring::authority_average(authority, cedula),
        };
        let composite = scoring::composite(&raw).map(round2);
        let rounded = ChannelScores {
            self_eval: raw.self_eval.map(round2),
            student: raw.student.map(round2),
            peer: raw.peer.map(round2),
            authority: raw.authority.map(round2),
        };
        (rounded, composite)
    }

    /// Composite score for one teacher, grouped by cedula across every
    /// internal assignment id that maps to it. `composite: None` is the
    /// well-defined "no data yet" result, never an error.
    pub async fn teacher_composite(
        &self,
        period_id: i32,
        cedula: &str,
    ) -> Result<TeacherComposite> {
        let key = format!("composite:{period_id}:{cedula}");
        if let Some(cached) = self.composite_cache.get(&key) {
            return Ok(cached);
        }

        let assignments = self.academic.assignments_for_period(period_id).await?;
        let index = TeacherIndex::from_assignments(&assignments);
        let entry = index
            .entry(cedula)
            .ok_or_else(|| EngineError::not_found("teacher", cedula))?;

        let self_rows = self.channel_rows(Channel::SelfEval, period_id).await?;
        let student_rows = self.channel_rows(Channel::Student, period_id).await?;
        let peer_rows = self.channel_rows(Channel::Peer, period_id).await?;
        let authority = self.evals.authority_scores(period_id).await?;

        let (per_channel, composite) = Self::score_teacher(
            &index,
            cedula,
            self_rows.as_deref(),
            student_rows.as_deref(),
            peer_rows.as_deref(),
            &authority,
        );

        let result = TeacherComposite {
            cedula: cedula.to_string(),
            teacher_name: entry.name.clone(),
            period_id,
            period_name: self.period_name(period_id).await?,
            per_channel,
            composite,
        };
        self.composite_cache.set(key, result.clone());
        Ok(result)
    }

    /// Participation for the period: per-channel completed/expected and
    /// the aggregate rate over the included channels.
    pub async fn period_participation(&self, period_id: i32) -> Result<ParticipationReport> {
        let key = format!("participation:{period_id}");
        if let Some(cached) = self.participation_cache.get(&key) {
            return Ok(cached);
        }

        let assignments = self.academic.assignments_for_period(period_id).await?;
        let index = TeacherIndex::from_assignments(&assignments);

        let mut counts = ChannelCountSet::default();
        if let Some(instance) = self.evals.instance_for(Channel::SelfEval, period_id).await? {
            counts.self_eval = Some(ChannelCounts {
                completed: self.evals.completed_group_count(instance.id).await?,
                expected: index.teacher_count(),
            });
        }
        if let Some(instance) = self.evals.instance_for(Channel::Student, period_id).await? {
            counts.student = Some(ChannelCounts {
                completed: self.evals.completed_group_count(instance.id).await?,
                expected: self.academic.enrollment_pair_count(period_id).await?,
            });
        }
        if let Some(instance) = self.evals.instance_for(Channel::Peer, period_id).await? {
            counts.peer = Some(ChannelCounts {
                completed: self.evals.completed_group_count(instance.id).await?,
                expected: self.evals.assignment_count(period_id).await?,
            });
        }

        let report = participation::assemble_report(
            period_id,
            self.period_name(period_id).await?,
            counts,
        );
        self.participation_cache.set(key, report.clone());
        Ok(report)
    }

    /// Every teacher in the period with per-channel scores and
    /// composite, best first; teachers without data sort last.
    pub async fn detailed_results(&self, period_id: i32) -> Result<PeriodResults> {
        let key = format!("results:{period_id}");
        if let Some(cached) = self.results_cache.get(&key) {
            return Ok(cached);
        }

        let assignments = self.academic.assignments_for_period(period_id).await?;
        let index = TeacherIndex::from_assignments(&assignments);

        let self_rows = self.channel_rows(Channel::SelfEval, period_id).await?;
        let student_rows = self.channel_rows(Channel::Student, period_id).await?;
        let peer_rows = self.channel_rows(Channel::Peer, period_id).await?;
        let authority = self.evals.authority_scores(period_id).await?;

        let mut teachers = Vec::new();
        for cedula in index.cedulas() {
            let entry = match index.entry(&cedula) {
                Some(entry) => entry,
                None => continue,
            };
            let (per_channel, composite) = Self::score_teacher(
                &index,
                &cedula,
                self_rows.as_deref(),
                student_rows.as_deref(),
                peer_rows.as_deref(),
                &authority,
            );
            teachers.push(TeacherResult {
                cedula,
                teacher_name: entry.name.clone(),
                career: entry.career.clone(),
                per_channel,
                composite,
            });
        }

        teachers.sort_by(|a, b| {
            let left = b.composite.unwrap_or(-1.0);
            let right = a.composite.unwrap_or(-1.0);
            left.partial_cmp(&right)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.teacher_name.cmp(&b.teacher_name))
        });

        let results = PeriodResults {
            period_id,
            period_name: self.period_name(period_id).await?,
            teachers,
        };
        self.results_cache.set(key, results.clone());
        Ok(results)
    }

    /// Teachers with an open self-evaluation campaign who have not
    /// submitted yet. Empty when no self instance exists.
    pub async fn pending_self_evaluations(
        &self,
        period_id: i32,
    ) -> Result<Vec<PendingSelfEvaluation>> {
        let instance = match self.evals.instance_for(Channel::SelfEval, period_id).await? {
            Some(instance) => instance,
            None => return Ok(Vec::new()),
        };

        let submitted = self.evals.submitted_evaluator_keys(instance.id).await?;
        let assignments = self.academic.assignments_for_period(period_id).await?;
        let index = TeacherIndex::from_assignments(&assignments);

        let mut pending = Vec::new();
        for cedula in index.cedulas() {
            if submitted.contains(&cedula) {
                continue;
            }
            if let Some(entry) = index.entry(&cedula) {
                pending.push(PendingSelfEvaluation {
                    cedula,
                    teacher_name: entry.name.clone(),
                });
            }
        }
        Ok(pending)
    }
}
