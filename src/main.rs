use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cache;
mod db;
mod eligibility;
mod engine;
mod error;
mod models;
mod notify;
mod participation;
mod report;
mod scoring;
mod store;
#[cfg(test)]
mod testutil;

use engine::Engine;
use error::EngineError;
use models::{Channel, NewAssignment};

#[derive(Parser)]
#[command(name = "faculty-eval")]
#[command(about = "Faculty evaluation aggregation and scoring engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import peer assignments from a CSV file
    ImportAssignments {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        period: i32,
    },
    /// Open an evaluation campaign for a channel and period
    CreateInstance {
        #[arg(long, value_enum)]
        channel: Channel,
        #[arg(long)]
        period: i32,
    },
    /// Declare a single peer assignment
    CreateAssignment {
        #[arg(long)]
        period: i32,
        #[arg(long)]
        evaluator: String,
        #[arg(long)]
        evaluated: String,
        #[arg(long)]
        subject: Option<i32>,
        #[arg(long)]
        effective: chrono::NaiveDate,
        #[arg(long)]
        starts: Option<chrono::NaiveDateTime>,
        #[arg(long)]
        ends: Option<chrono::NaiveDateTime>,
    },
    /// Submit one evaluator's response batch for one subject
    SubmitResponses {
        #[arg(long)]
        instance: uuid::Uuid,
        #[arg(long)]
        evaluator: String,
        #[arg(long)]
        assignment: i64,
        /// JSON array of answers, e.g. '[{"question_id":1,"value":4.5}]'
        #[arg(long)]
        answers: String,
        /// Replace an earlier submission instead of rejecting it
        #[arg(long, default_value_t = false)]
        edit: bool,
    },
    /// Record a direct authority rating for a teacher
    SetAuthorityScore {
        #[arg(long)]
        period: i32,
        #[arg(long)]
        cedula: String,
        #[arg(long)]
        authority: String,
        #[arg(long)]
        score: f64,
    },
    /// Soft-delete one authority score
    RemoveAuthorityScore {
        #[arg(long)]
        id: uuid::Uuid,
    },
    /// Composite score for one teacher
    Composite {
        #[arg(long)]
        period: i32,
        #[arg(long)]
        cedula: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Participation rates for a period
    Participation {
        #[arg(long)]
        period: i32,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate a markdown report for a period
    Report {
        #[arg(long)]
        period: i32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Notify teachers with a pending self-evaluation
    Remind {
        #[arg(long)]
        period: i32,
    },
}

#[derive(serde::Deserialize)]
struct AssignmentCsvRow {
    evaluator_cedula: String,
    evaluated_cedula: String,
    subject_id: Option<i32>,
    effective_date: chrono::NaiveDate,
    starts_at: Option<chrono::NaiveDateTime>,
    ends_at: Option<chrono::NaiveDateTime>,
}

async fn import_assignments(engine: &Engine, csv_path: &PathBuf, period: i32) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let today = chrono::Local::now().date_naive();
    let mut inserted = 0usize;

    for result in reader.deserialize::<AssignmentCsvRow>() {
        let row = result?;
        let new = NewAssignment {
            period_id: period,
            evaluator_cedula: row.evaluator_cedula,
            evaluated_cedula: row.evaluated_cedula,
            subject_id: row.subject_id,
            effective_date: row.effective_date,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        };

        match engine.create_assignment(new, today).await {
            Ok(_) => inserted += 1,
            Err(EngineError::Conflict(conflict)) => {
                tracing::warn!(%conflict, "skipping ineligible assignment row");
            }
            Err(other) => return Err(other.into()),
        }
    }

    Ok(inserted)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = Engine::new(
        Arc::new(db::PgAcademicStore::new(pool.clone())),
        Arc::new(db::PgEvaluationStore::new(pool.clone())),
    );

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAssignments { csv, period } => {
            let inserted = import_assignments(&engine, &csv, period).await?;
            println!("Inserted {inserted} peer assignments from {}.", csv.display());
        }
        Commands::CreateInstance { channel, period } => {
            let instance = engine.create_instance(channel, period).await?;
            println!(
                "Instance {} opened for {} evaluations in period {period} ({}).",
                instance.id,
                instance.channel.as_str(),
                instance.status.as_str()
            );
        }
        Commands::CreateAssignment {
            period,
            evaluator,
            evaluated,
            subject,
            effective,
            starts,
            ends,
        } => {
            let today = chrono::Local::now().date_naive();
            let assignment = engine
                .create_assignment(
                    NewAssignment {
                        period_id: period,
                        evaluator_cedula: evaluator,
                        evaluated_cedula: evaluated,
                        subject_id: subject,
                        effective_date: effective,
                        starts_at: starts,
                        ends_at: ends,
                    },
                    today,
                )
                .await?;
            match assignment.subject_id {
                Some(subject_id) => println!(
                    "Assignment {} licenses {} to evaluate {} for subject {subject_id}, effective {}.",
                    assignment.id,
                    assignment.evaluator_cedula,
                    assignment.evaluated_cedula,
                    assignment.effective_date
                ),
                None => println!(
                    "Assignment {} licenses {} to evaluate {} across all subjects, effective {}.",
                    assignment.id,
                    assignment.evaluator_cedula,
                    assignment.evaluated_cedula,
                    assignment.effective_date
                ),
            }
            if let (Some(starts_at), Some(ends_at)) = (assignment.starts_at, assignment.ends_at) {
                println!("- evaluation window: {starts_at} to {ends_at}");
            }
        }
        Commands::SubmitResponses {
            instance,
            evaluator,
            assignment,
            answers,
            edit,
        } => {
            let answers: Vec<models::Answer> =
                serde_json::from_str(&answers).context("answers must be a JSON array")?;
            engine
                .submit_responses(instance, &evaluator, assignment, &answers, edit)
                .await?;
            println!("Stored {} answers from {evaluator}.", answers.len());
        }
        Commands::SetAuthorityScore {
            period,
            cedula,
            authority,
            score,
        } => {
            let stored = engine
                .set_authority_score(period, &cedula, &authority, score)
                .await?;
            println!(
                "Recorded {:.2} for {} from {} in period {}.",
                stored.score, stored.teacher_cedula, stored.authority_key, stored.period_id
            );
        }
        Commands::RemoveAuthorityScore { id } => {
            engine.remove_authority_score(id).await?;
            println!("Authority score {id} removed.");
        }
        Commands::Composite {
            period,
            cedula,
            json,
        } => {
            let result = engine.teacher_composite(period, &cedula).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                match result.composite {
                    Some(score) => println!(
                        "{} ({}) composite {score:.2} in {}",
                        result.teacher_name, result.cedula, result.period_name
                    ),
                    None => println!(
                        "{} ({}) has no evaluation data in {}",
                        result.teacher_name, result.cedula, result.period_name
                    ),
                }
                for (label, value) in [
                    ("self", result.per_channel.self_eval),
                    ("student", result.per_channel.student),
                    ("peer", result.per_channel.peer),
                    ("authority", result.per_channel.authority),
                ] {
                    match value {
                        Some(value) => println!("- {label}: {value:.2}"),
                        None => println!("- {label}: no data"),
                    }
                }
            }
        }
        Commands::Participation { period, json } => {
            let report = engine.period_participation(period).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Participation in {}: {} of {} ({:.2}%)",
                    report.period_name, report.completed, report.expected, report.rate
                );
                for (label, channel) in [
                    ("self", &report.breakdown.self_eval),
                    ("student", &report.breakdown.student),
                    ("peer", &report.breakdown.peer),
                ] {
                    if let Some(channel) = channel {
                        println!(
                            "- {label}: {} of {} ({:.2}%)",
                            channel.completed, channel.expected, channel.rate
                        );
                    }
                }
            }
        }
        Commands::Report { period, out } => {
            let results = engine.detailed_results(period).await?;
            let participation = engine.period_participation(period).await?;
            let report = report::build_report(&results, &participation);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Remind { period } => {
            let pending = engine.pending_self_evaluations(period).await?;
            if pending.is_empty() {
                println!("No pending self-evaluations.");
            } else {
                let batch: Vec<notify::Notification> = pending
                    .iter()
                    .map(|teacher| notify::Notification {
                        recipient: teacher.cedula.clone(),
                        subject: "Self-evaluation reminder".to_string(),
                        body: format!(
                            "{}, your self-evaluation for this period is still pending.",
                            teacher.teacher_name
                        ),
                    })
                    .collect();
                let total = batch.len();
                let failures = notify::dispatch_all(Arc::new(notify::LogNotifier), batch).await;
                println!("Sent {} reminders, {} failed.", total - failures.len(), failures.len());
            }
        }
    }

    Ok(())
}
