//! Postgres-backed stores plus schema and seed tooling.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{
    AuthorityScore, Channel, EvaluationInstance, InstanceStatus, NewAssignment, PeerAssignment,
    Period, ResponseRow, TeachingAssignment,
};
use crate::store::{AcademicStore, EvaluationStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Deterministic sample data across both schemas. Lucia holds two
/// teaching-assignment ids on purpose, so scoring has to reconcile them
/// under one cedula.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academic.periods (id, name, active)
        VALUES ($1, $2, TRUE)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(7)
    .bind("2025-2026")
    .execute(pool)
    .await?;

    let teachers = vec![
        ("0912345678", "Lucia Andrade"),
        ("0923456789", "Marco Teran"),
        ("0934567890", "Elena Baus"),
    ];

    for (cedula, name) in teachers {
        sqlx::query(
            r#"
            INSERT INTO academic.teachers (cedula, full_name)
            VALUES ($1, $2)
            ON CONFLICT (cedula) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(cedula)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let assignments = vec![
        (101_i64, "0912345678", 11, "Algorithms", "Systems Engineering"),
        (102_i64, "0912345678", 12, "Databases", "Systems Engineering"),
        (103_i64, "0923456789", 21, "Calculus", "Mathematics"),
        (104_i64, "0934567890", 31, "Linear Algebra", "Mathematics"),
    ];

    for (id, cedula, subject_id, subject_name, career) in assignments {
        sqlx::query(
            r#"
            INSERT INTO academic.teaching_assignments
            (id, cedula, period_id, subject_id, subject_name, career)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(cedula)
        .bind(7)
        .bind(subject_id)
        .bind(subject_name)
        .bind(career)
        .execute(pool)
        .await?;
    }

    let enrollments: Vec<(i64, i64)> = vec![
        (9001, 101),
        (9002, 101),
        (9003, 101),
        (9001, 102),
        (9002, 102),
        (9001, 103),
        (9002, 103),
        (9004, 104),
    ];

    for (student_id, assignment_id) in enrollments {
        sqlx::query(
            r#"
            INSERT INTO academic.enrollments (student_id, assignment_id)
            VALUES ($1, $2)
            ON CONFLICT (student_id, assignment_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(assignment_id)
        .execute(pool)
        .await?;
    }

    tracing::info!("seeded period 7 with 3 teachers and 8 enrollment pairs");
    Ok(())
}

fn decode_channel(value: &str) -> Result<Channel> {
    Channel::from_db(value).ok_or_else(|| {
        EngineError::Store(sqlx::Error::Decode(
            format!("unknown channel in store: {value}").into(),
        ))
    })
}

fn decode_status(value: &str) -> Result<InstanceStatus> {
    InstanceStatus::from_db(value).ok_or_else(|| {
        EngineError::Store(sqlx::Error::Decode(
            format!("unknown instance status in store: {value}").into(),
        ))
    })
}

fn instance_from_row(row: &PgRow) -> Result<EvaluationInstance> {
    let channel: String = row.get("channel");
    let status: String = row.get("status");
    Ok(EvaluationInstance {
        id: row.get("id"),
        channel: decode_channel(&channel)?,
        period_id: row.get("period_id"),
        status: decode_status(&status)?,
        deleted: row.get("deleted"),
    })
}

fn assignment_from_row(row: &PgRow) -> PeerAssignment {
    PeerAssignment {
        id: row.get("id"),
        period_id: row.get("period_id"),
        evaluator_cedula: row.get("evaluator_cedula"),
        evaluated_cedula: row.get("evaluated_cedula"),
        subject_id: row.get("subject_id"),
        effective_date: row.get("effective_date"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
    }
}

pub struct PgAcademicStore {
    pool: PgPool,
}

impl PgAcademicStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AcademicStore for PgAcademicStore {
    async fn period(&self, period_id: i32) -> Result<Option<Period>> {
        let row = sqlx::query("SELECT id, name, active FROM academic.periods WHERE id = $1")
            .bind(period_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Period {
            id: row.get("id"),
            name: row.get("name"),
            active: row.get("active"),
        }))
    }

    async fn assignments_for_period(&self, period_id: i32) -> Result<Vec<TeachingAssignment>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.cedula, t.full_name, a.period_id, a.career
            FROM academic.teaching_assignments a
            JOIN academic.teachers t ON t.cedula = a.cedula
            WHERE a.period_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TeachingAssignment {
                id: row.get("id"),
                cedula: row.get("cedula"),
                teacher_name: row.get("full_name"),
                period_id: row.get("period_id"),
                career: row.get("career"),
            })
            .collect())
    }

    async fn enrollment_pair_count(&self, period_id: i32) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS pairs
            FROM academic.enrollments e
            JOIN academic.teaching_assignments a ON a.id = e.assignment_id
            WHERE a.period_id = $1
            "#,
        )
        .bind(period_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("pairs"))
    }
}

pub struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn instance(&self, instance_id: Uuid) -> Result<Option<EvaluationInstance>> {
        let row = sqlx::query(
            "SELECT id, channel, period_id, status, deleted FROM evaluation.instances WHERE id = $1",
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| instance_from_row(&row)).transpose()
    }

    async fn instance_for(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<Option<EvaluationInstance>> {
        let row = sqlx::query(
            r#"
            SELECT id, channel, period_id, status, deleted
            FROM evaluation.instances
            WHERE channel = $1 AND period_id = $2 AND NOT deleted
            "#,
        )
        .bind(channel.as_str())
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| instance_from_row(&row)).transpose()
    }

    async fn insert_instance(
        &self,
        channel: Channel,
        period_id: i32,
    ) -> Result<EvaluationInstance> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO evaluation.instances (id, channel, period_id, status, deleted)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(id)
        .bind(channel.as_str())
        .bind(period_id)
        .bind(InstanceStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(EvaluationInstance {
            id,
            channel,
            period_id,
            status: InstanceStatus::Pending,
            deleted: false,
        })
    }

    async fn mark_instance_completed(&self, instance_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE evaluation.instances SET status = $2 WHERE id = $1")
            .bind(instance_id)
            .bind(InstanceStatus::Completed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn responses_for_instance(&self, instance_id: Uuid) -> Result<Vec<ResponseRow>> {
        let rows = sqlx::query(
            r#"
            SELECT instance_id, evaluator_key, assignment_id, question_id, value
            FROM evaluation.responses
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ResponseRow {
                instance_id: row.get("instance_id"),
                evaluator_key: row.get("evaluator_key"),
                assignment_id: row.get("assignment_id"),
                question_id: row.get("question_id"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn has_submission(
        &self,
        instance_id: Uuid,
        evaluator_key: &str,
        assignment_id: i64,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS answered
            FROM evaluation.responses
            WHERE instance_id = $1 AND evaluator_key = $2 AND assignment_id = $3
            "#,
        )
        .bind(instance_id)
        .bind(evaluator_key)
        .bind(assignment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("answered") > 0)
    }

    async fn upsert_responses(&self, rows: &[ResponseRow]) -> Result<()> {
        let mut groups: Vec<(Uuid, &str, i64)> = Vec::new();
        for row in rows {
            let group = (row.instance_id, row.evaluator_key.as_str(), row.assignment_id);
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        // Replace whole groups so an edit with fewer answers leaves no
        // stale rows behind.
        for (instance_id, evaluator_key, assignment_id) in groups {
            sqlx::query(
                r#"
                DELETE FROM evaluation.responses
                WHERE instance_id = $1 AND evaluator_key = $2 AND assignment_id = $3
                "#,
            )
            .bind(instance_id)
            .bind(evaluator_key)
            .bind(assignment_id)
            .execute(&self.pool)
            .await?;
        }

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO evaluation.responses
                (instance_id, evaluator_key, assignment_id, question_id, value)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (instance_id, evaluator_key, assignment_id, question_id)
                DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(row.instance_id)
            .bind(&row.evaluator_key)
            .bind(row.assignment_id)
            .bind(row.question_id)
            .bind(row.value)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn completed_group_count(&self, instance_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS done FROM (
                SELECT DISTINCT evaluator_key, assignment_id
                FROM evaluation.responses
                WHERE instance_id = $1
            ) AS groups
            "#,
        )
        .bind(instance_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("done"))
    }

    async fn submitted_evaluator_keys(&self, instance_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT evaluator_key FROM evaluation.responses WHERE instance_id = $1",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("evaluator_key")).collect())
    }

    async fn find_assignment(
        &self,
        period_id: i32,
        evaluator_cedula: &str,
        evaluated_cedula: &str,
        subject_id: Option<i32>,
    ) -> Result<Option<PeerAssignment>> {
        let row = sqlx::query(
            r#"
            SELECT id, period_id, evaluator_cedula, evaluated_cedula,
                   subject_id, effective_date, starts_at, ends_at
            FROM evaluation.peer_assignments
            WHERE period_id = $1
              AND evaluator_cedula = $2
              AND evaluated_cedula = $3
              AND subject_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(period_id)
        .bind(evaluator_cedula)
        .bind(evaluated_cedula)
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| assignment_from_row(&row)))
    }

    async fn insert_assignment(&self, new: &NewAssignment) -> Result<PeerAssignment> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO evaluation.peer_assignments
            (id, period_id, evaluator_cedula, evaluated_cedula,
             subject_id, effective_date, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(new.period_id)
        .bind(&new.evaluator_cedula)
        .bind(&new.evaluated_cedula)
        .bind(new.subject_id)
        .bind(new.effective_date)
        .bind(new.starts_at)
        .bind(new.ends_at)
        .execute(&self.pool)
        .await?;

        Ok(PeerAssignment {
            id,
            period_id: new.period_id,
            evaluator_cedula: new.evaluator_cedula.clone(),
            evaluated_cedula: new.evaluated_cedula.clone(),
            subject_id: new.subject_id,
            effective_date: new.effective_date,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
        })
    }

    async fn assignment_count(&self, period_id: i32) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS declared FROM evaluation.peer_assignments WHERE period_id = $1",
        )
        .bind(period_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("declared"))
    }

    async fn upsert_authority_score(
        &self,
        period_id: i32,
        teacher_cedula: &str,
        authority_key: &str,
        score: f64,
    ) -> Result<AuthorityScore> {
        let row = sqlx::query(
            r#"
            INSERT INTO evaluation.authority_scores
            (id, period_id, teacher_cedula, authority_key, score, deleted_at)
            VALUES ($1, $2, $3, $4, $5, NULL)
            ON CONFLICT (period_id, teacher_cedula, authority_key) WHERE deleted_at IS NULL
            DO UPDATE SET score = EXCLUDED.score
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(period_id)
        .bind(teacher_cedula)
        .bind(authority_key)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(AuthorityScore {
            id: row.get("id"),
            period_id,
            teacher_cedula: teacher_cedula.to_string(),
            authority_key: authority_key.to_string(),
            score,
        })
    }

    async fn authority_scores(&self, period_id: i32) -> Result<Vec<AuthorityScore>> {
        let rows = sqlx::query(
            r#"
            SELECT id, period_id, teacher_cedula, authority_key, score
            FROM evaluation.authority_scores
            WHERE period_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AuthorityScore {
                id: row.get("id"),
                period_id: row.get("period_id"),
                teacher_cedula: row.get("teacher_cedula"),
                authority_key: row.get("authority_key"),
                score: row.get("score"),
            })
            .collect())
    }

    async fn delete_authority_score(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE evaluation.authority_scores SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
