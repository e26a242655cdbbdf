use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four evaluation channels combined into a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// A teacher rating their own performance.
    #[value(name = "self")]
    SelfEval,
    /// Enrolled students rating the teacher of a course.
    Student,
    /// A teacher rating a colleague under a declared peer assignment.
    Peer,
    /// An authority entering a direct 0-100 rating.
    Authority,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::SelfEval,
        Channel::Student,
        Channel::Peer,
        Channel::Authority,
    ];

    /// Fixed ponderation weight. Composites are renormalized over the
    /// weights of the channels that actually have data.
    pub fn weight(self) -> f64 {
        match self {
            Channel::SelfEval => 0.10,
            Channel::Student => 0.40,
            Channel::Peer => 0.30,
            Channel::Authority => 0.20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::SelfEval => "self",
            Channel::Student => "student",
            Channel::Peer => "peer",
            Channel::Authority => "authority",
        }
    }

    pub fn from_db(value: &str) -> Option<Channel> {
        match value {
            "self" => Some(Channel::SelfEval),
            "student" => Some(Channel::Student),
            "peer" => Some(Channel::Peer),
            "authority" => Some(Channel::Authority),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Period {
    pub id: i32,
    pub name: String,
    pub active: bool,
}

/// One internal teaching-assignment record from the academic store. The
/// same cedula may appear on several rows across subjects and careers;
/// only the columns the engine aggregates over are read.
#[derive(Debug, Clone)]
pub struct TeachingAssignment {
    pub id: i64,
    pub cedula: String,
    pub teacher_name: String,
    pub period_id: i32,
    pub career: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Pending,
    Completed,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Completed => "completed",
        }
    }

    pub fn from_db(value: &str) -> Option<InstanceStatus> {
        match value {
            "pending" => Some(InstanceStatus::Pending),
            "completed" => Some(InstanceStatus::Completed),
            _ => None,
        }
    }
}

/// One running campaign of a channel for one period.
#[derive(Debug, Clone)]
pub struct EvaluationInstance {
    pub id: Uuid,
    pub channel: Channel,
    pub period_id: i32,
    pub status: InstanceStatus,
    pub deleted: bool,
}

/// One evaluator's answer to one question. A group of rows sharing
/// (instance, evaluator_key, assignment_id) is a completed submission.
/// The evaluator_key is a cedula for self and peer responses and a
/// student identifier for student responses.
#[derive(Debug, Clone)]
pub struct ResponseRow {
    pub instance_id: Uuid,
    pub evaluator_key: String,
    pub assignment_id: i64,
    pub question_id: i32,
    pub value: f64,
}

/// Submission payload: one Likert answer on the 0-5 scale.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Answer {
    pub question_id: i32,
    pub value: f64,
}

/// A declared grant licensing one teacher to evaluate another in a period.
#[derive(Debug, Clone)]
pub struct PeerAssignment {
    pub id: Uuid,
    pub period_id: i32,
    pub evaluator_cedula: String,
    pub evaluated_cedula: String,
    pub subject_id: Option<i32>,
    pub effective_date: NaiveDate,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub period_id: i32,
    pub evaluator_cedula: String,
    pub evaluated_cedula: String,
    pub subject_id: Option<i32>,
    pub effective_date: NaiveDate,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
}

/// A direct 0-100 rating from an authority, one active row per
/// (period, teacher, authority).
#[derive(Debug, Clone)]
pub struct AuthorityScore {
    pub id: Uuid,
    pub period_id: i32,
    pub teacher_cedula: String,
    pub authority_key: String,
    pub score: f64,
}

/// Per-channel averages on the 0-100 scale; `None` means no data for
/// that channel, which is distinct from a score of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelScores {
    #[serde(rename = "self")]
    pub self_eval: Option<f64>,
    pub student: Option<f64>,
    pub peer: Option<f64>,
    pub authority: Option<f64>,
}

impl ChannelScores {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::SelfEval => self.self_eval,
            Channel::Student => self.student,
            Channel::Peer => self.peer,
            Channel::Authority => self.authority,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherComposite {
    pub cedula: String,
    pub teacher_name: String,
    pub period_id: i32,
    pub period_name: String,
    pub per_channel: ChannelScores,
    /// `None` when no channel has any data for this teacher.
    pub composite: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelParticipation {
    pub completed: i64,
    pub expected: i64,
    pub rate: f64,
}

/// Per-channel participation. A channel without an instance, or with an
/// expected count of zero, is omitted rather than reported as 0/0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParticipationBreakdown {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_eval: Option<ChannelParticipation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<ChannelParticipation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<ChannelParticipation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipationReport {
    pub period_id: i32,
    pub period_name: String,
    pub completed: i64,
    pub expected: i64,
    pub rate: f64,
    pub breakdown: ParticipationBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherResult {
    pub cedula: String,
    pub teacher_name: String,
    pub career: String,
    pub per_channel: ChannelScores,
    pub composite: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodResults {
    pub period_id: i32,
    pub period_name: String,
    pub teachers: Vec<TeacherResult>,
}
