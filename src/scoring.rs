//! Channel averages and weighted composite scores.

use std::collections::HashMap;

use crate::models::{AuthorityScore, Channel, ChannelScores, ResponseRow, TeachingAssignment};

/// Reconciles the academic store's per-assignment teacher ids with the
/// stable cedula: one person may appear under several internal ids
/// across subjects, and every aggregate is grouped by cedula through
/// this index, never by raw assignment id.
pub struct TeacherIndex {
    by_cedula: HashMap<String, TeacherEntry>,
}

pub struct TeacherEntry {
    pub name: String,
    pub career: String,
    pub assignment_ids: Vec<i64>,
}

impl TeacherIndex {
    pub fn from_assignments(assignments: &[TeachingAssignment]) -> Self {
        let mut by_cedula: HashMap<String, TeacherEntry> = HashMap::new();
        for assignment in assignments {
            let entry = by_cedula
                .entry(assignment.cedula.clone())
                .or_insert_with(|| TeacherEntry {
                    name: assignment.teacher_name.clone(),
                    career: assignment.career.clone(),
                    assignment_ids: Vec::new(),
                });
            if !entry.assignment_ids.contains(&assignment.id) {
                entry.assignment_ids.push(assignment.id);
            }
        }
        Self { by_cedula }
    }

    pub fn contains(&self, cedula: &str) -> bool {
        self.by_cedula.contains_key(cedula)
    }

    pub fn entry(&self, cedula: &str) -> Option<&TeacherEntry> {
        self.by_cedula.get(cedula)
    }

    pub fn assignment_ids(&self, cedula: &str) -> &[i64] {
        self.by_cedula
            .get(cedula)
            .map(|entry| entry.assignment_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct teachers (cedulas) in the period.
    pub fn teacher_count(&self) -> i64 {
        self.by_cedula.len() as i64
    }

    /// Cedulas in a stable order for reporting.
    pub fn cedulas(&self) -> Vec<String> {
        let mut cedulas: Vec<String> = self.by_cedula.keys().cloned().collect();
        cedulas.sort();
        cedulas
    }
}

/// Mean Likert response (0-5) over the teacher's assignment ids,
/// normalized to the 0-100 scale. `None` when the teacher has no
/// responses in the channel, which is distinct from scoring zero.
pub fn channel_average(rows: &[ResponseRow], assignment_ids: &[i64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0u32;
    for row in rows {
        if assignment_ids.contains(&row.assignment_id) {
            sum += row.value;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count) * 20.0)
    }
}

/// Mean of the teacher's direct 0-100 authority ratings.
pub fn authority_average(scores: &[AuthorityScore], cedula: &str) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0u32;
    for score in scores {
        if score.teacher_cedula == cedula {
            sum += score.score;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

/// Weighted composite over the channels that have data. The sum of
/// contributions is divided by the sum of the weights actually present,
/// so a teacher missing a channel is rescaled, never penalized by a
/// hardcoded divide-by-four. `None` iff every channel is `None`.
pub fn composite(scores: &ChannelScores) -> Option<f64> {
    let mut numerator = 0.0;
    let mut weight_sum = 0.0;
    for channel in Channel::ALL {
        if let Some(value) = scores.get(channel) {
            numerator += value * channel.weight();
            weight_sum += channel.weight();
        }
    }
    if weight_sum == 0.0 {
        None
    } else {
        Some(numerator / weight_sum)
    }
}

/// Rounding happens once, at the reporting boundary.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
