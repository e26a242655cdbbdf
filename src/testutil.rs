//! In-memory store fakes for exercising the engine without Postgres.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AuthorityScore, Channel, EvaluationInstance, InstanceStatus, NewAssignment, PeerAssignment,
    Period, ResponseRow, TeachingAssignment,
};
use crate::store::{AcademicStore, EvaluationStore};

#[derive(Default)]
pub struct MemoryAcademicStore {
    pub periods: Vec<Period>,
    pub assignments: Vec<TeachingAssignment>,
    /// (student_id, assignment_id) pairs.
    pub enrollments: Vec<(i64, i64)>,
}

#[async_trait]
impl AcademicStore for MemoryAcademicStore {
    async fn period(&self, period_id: i32) -> Result<Option<Period>> {
        Ok(self.periods.iter().find(|p| p.id == period_id).cloned())
    }

    async fn assignments_for_period(&self, period_id: i32) -> Result<Vec<TeachingAssignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.period_id == period_id)
            .cloned()
            .collect())
    }

    async fn enrollment_pair_count(&self, period_id: i32) -> Result<i64> {
        let count = self
            .enrollments
            .iter()
            .filter(|(_, assignment_id)| {
                self.assignments
                    .iter()
                    .any(|a| a.id == *assignment_id && a.period_id == period_id)
            })
            .count();
        Ok(count as i64)
    }
}

#[derive(Default)]
struct EvalState {
    instances: Vec<EvaluationInstance>,
    responses: Vec<ResponseRow>,
    assignments: Vec<PeerAssignment>,
    authority: Vec<AuthorityScore>,
}

#[derive(Default)]
pub struct MemoryEvaluationStore {
    inner: Mutex<EvalState>,
}

impl MemoryEvaluationStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, EvalState> {
        self.inner.lock().expect("eval state lock")
    }
}

#[async_trait]
impl EvaluationStore for MemoryEvaluationStore {
    async fn instance(&self, instance_id: Uuid) -> Result<Option<EvaluationInstance>> {
        Ok(self
            .lock()
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .cloned())
    }

    async fn instance_for(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<Option<EvaluationInstance>> {
        Ok(self
            .lock()
            .instances
            .iter()
            .find(|i| i.channel == channel && i.period_id == period_id && !i.deleted)
            .cloned())
    }

    async fn insert_instance(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<EvaluationInstance> {
        let instance = EvaluationInstance {
            id: Uuid::new_v4(),
            channel,
            period_id,
            status: InstanceStatus::Pending,
            deleted: false,
        };
        self.lock().instances.push(instance.clone());
        Ok(instance)
    }

    async fn mark_instance_completed(&self, instance_id: Uuid) -> Result<()> {
        let mut state = self.lock();
        if let Some(instance) = state.instances.iter_mut().find(|i| i.id == instance_id) {
            instance.status = InstanceStatus::Completed;
        }
        Ok(())
    }

    async fn responses_for_instance(&self, instance_id: Uuid) -> Result<Vec<ResponseRow>> {
        Ok(self
            .lock()
            .responses
            .iter()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn has_submission(
        &self,
        instance_id: Uuid,
        evaluator_key: &str,
        assignment_id: i64,
    ) -> Result<bool> {
        Ok(self.lock().responses.iter().any(|r| {
            r.instance_id == instance_id
                && r.evaluator_key == evaluator_key
                && r.assignment_id == assignment_id
        }))
    }

    async fn upsert_responses(&self, rows: &[ResponseRow]) -> Result<()> {
        let mut state = self.lock();
        state.responses.retain(|existing| {
            !rows.iter().any(|row| {
                row.instance_id == existing.instance_id
                    && row.evaluator_key == existing.evaluator_key
                    && row.assignment_id == existing.assignment_id
            })
        });
        state.responses.extend(rows.iter().cloned());
        Ok(())
    }

    async fn completed_group_count(&self, instance_id: Uuid) -> Result<i64> {
        let state = self.lock();
        let mut groups: Vec<(&str, i64)> = Vec::new();
        for row in state.responses.iter().filter(|r| r.instance_id == instance_id) {
            let group = (row.evaluator_key.as_str(), row.assignment_id);
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        Ok(groups.len() as i64)
    }

    async fn submitted_evaluator_keys(&self, instance_id: Uuid) -> Result<Vec<String>> {
        let state = self.lock();
        let mut keys: Vec<String> = Vec::new();
        for row in state.responses.iter().filter(|r| r.instance_id == instance_id) {
            if !keys.contains(&row.evaluator_key) {
                keys.push(row.evaluator_key.clone());
            }
        }
        Ok(keys)
    }

    async fn find_assignment(
        &self,
        period_id: i32,
        evaluator_cedula: &str,
        evaluated_cedula: &str,
        subject_id: Option<i32>,
    ) -> Result<Option<PeerAssignment>> {
        Ok(self
            .lock()
            .assignments
            .iter()
            .find(|a| {
                a.period_id == period_id
                    && a.evaluator_cedula == evaluator_cedula
                    && a.evaluated_cedula == evaluated_cedula
                    && a.subject_id == subject_id
            })
            .cloned())
    }

    async fn insert_assignment(&self, new: &NewAssignment) -> Result<PeerAssignment> {
        let assignment = PeerAssignment {
            id: Uuid::new_v4(),
            period_id: new.period_id,
            evaluator_cedula: new.evaluator_cedula.clone(),
            evaluated_cedula: new.evaluated_cedula.clone(),
            subject_id: new.subject_id,
            effective_date: new.effective_date,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
        };
        self.lock().assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn assignment_count(&self, period_id: i32) -> Result<i64> {
        Ok(self
            .lock()
            .assignments
            .iter()
            .filter(|a| a.period_id == period_id)
            .count() as i64)
    }

    async fn upsert_authority_score(
        &self,
        period_id: i32,
        teacher_cedula: &str,
        authority_key: &str,
        score: f64,
    ) -> Result<AuthorityScore> {
        let mut state = self.lock();
        if let Some(existing) = state.authority.iter_mut().find(|s| {
            s.period_id == period_id
                && s.teacher_cedula == teacher_cedula
                && s.authority_key == authority_key
        }) {
            existing.score = score;
            return Ok(existing.clone());
        }
        let entry = AuthorityScore {
            id: Uuid::new_v4(),
            period_id,
            teacher_cedula: teacher_cedula.to_string(),
            authority_key: authority_key.to_string(),
            score,
        };
        state.authority.push(entry.clone());
        Ok(entry)
    }

    async fn authority_scores(&self, period_id: i32) -> Result<Vec<AuthorityScore>> {
        Ok(self
            .lock()
            .authority
            .iter()
            .filter(|s| s.period_id == period_id)
            .cloned()
            .collect())
    }

    async fn delete_authority_score(&self, id: Uuid) -> Result<()> {
        self.lock().authority.retain(|s| s.id != id);
        Ok(())
    }
}

/// A period-7 academic fixture: Lucia under two assignment ids, Marco
/// and Elena under one each, ten enrollment pairs.
pub fn sample_academic() -> MemoryAcademicStore {
    let assignment = |id: i64, cedula: &str, name: &str, career: &str| TeachingAssignment {
        id,
        cedula: cedula.to_string(),
        teacher_name: name.to_string(),
        period_id: 7,
        career: career.to_string(),
    };

    MemoryAcademicStore {
        periods: vec![
            Period {
                id: 7,
                name: "2025-2026".to_string(),
                active: true,
            },
            Period {
                id: 6,
                name: "2024-2025".to_string(),
                active: false,
            },
        ],
        assignments: vec![
            assignment(101, "0912345678", "Lucia Andrade", "Systems Engineering"),
            assignment(102, "0912345678", "Lucia Andrade", "Systems Engineering"),
            assignment(103, "0923456789", "Marco Teran", "Mathematics"),
            assignment(104, "0934567890", "Elena Baus", "Mathematics"),
        ],
        enrollments: vec![
            (9001, 101),
            (9002, 101),
            (9003, 101),
            (9004, 101),
            (9001, 102),
            (9002, 102),
            (9003, 102),
            (9001, 103),
            (9002, 103),
            (9004, 104),
        ],
    }
}
