use std::fmt::Write;

use crate::models::{ChannelParticipation, ParticipationReport, PeriodResults};

fn score_label(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => "no data".to_string(),
    }
}

fn participation_line(output: &mut String, label: &str, channel: &ChannelParticipation) {
    let _ = writeln!(
        output,
        "- {}: {} of {} completed ({:.2}%)",
        label, channel.completed, channel.expected, channel.rate
    );
}

pub fn build_report(results: &PeriodResults, participation: &ParticipationReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Faculty Evaluation Report");
    let _ = writeln!(output, "Period: {}", results.period_name);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Participation");

    let breakdown = &participation.breakdown;
    if breakdown.self_eval.is_none() && breakdown.student.is_none() && breakdown.peer.is_none() {
        let _ = writeln!(output, "No evaluation campaigns with expected responses.");
    } else {
        if let Some(channel) = &breakdown.self_eval {
            participation_line(&mut output, "self-evaluation", channel);
        }
        if let Some(channel) = &breakdown.student {
            participation_line(&mut output, "student evaluation", channel);
        }
        if let Some(channel) = &breakdown.peer {
            participation_line(&mut output, "peer evaluation", channel);
        }
        let _ = writeln!(
            output,
            "- overall: {} of {} completed ({:.2}%)",
            participation.completed, participation.expected, participation.rate
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Composite Scores");

    if results.teachers.is_empty() {
        let _ = writeln!(output, "No teachers hold assignments in this period.");
    } else {
        for teacher in &results.teachers {
            let _ = writeln!(
                output,
                "- {} ({}, {}) composite {} [self {}, student {}, peer {}, authority {}]",
                teacher.teacher_name,
                teacher.cedula,
                teacher.career,
                score_label(teacher.composite),
                score_label(teacher.per_channel.self_eval),
                score_label(teacher.per_channel.student),
                score_label(teacher.per_channel.peer),
                score_label(teacher.per_channel.authority),
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelScores, ParticipationBreakdown, TeacherResult};

    #[test]
    fn report_lists_participation_and_scores() {
        let results = PeriodResults {
            period_id: 7,
            period_name: "2025-2026".to_string(),
            teachers: vec![TeacherResult {
                cedula: "0912345678".to_string(),
                teacher_name: "Lucia Andrade".to_string(),
                career: "Systems Engineering".to_string(),
                per_channel: ChannelScores {
                    self_eval: Some(80.0),
                    student: Some(90.0),
                    peer: None,
                    authority: Some(70.0),
                },
                composite: Some(82.86),
            }],
        };
        let participation = ParticipationReport {
            period_id: 7,
            period_name: "2025-2026".to_string(),
            completed: 6,
            expected: 10,
            rate: 60.0,
            breakdown: ParticipationBreakdown {
                student: Some(ChannelParticipation {
                    completed: 6,
                    expected: 10,
                    rate: 60.0,
                }),
                ..Default::default()
            },
        };

        let report = build_report(&results, &participation);
        assert!(report.contains("# Faculty Evaluation Report"));
        assert!(report.contains("- student evaluation: 6 of 10 completed (60.00%)"));
        assert!(report.contains("composite 82.86"));
        assert!(report.contains("peer no data"));
    }

    #[test]
    fn empty_period_renders_fallback_lines() {
        let results = PeriodResults {
            period_id: 7,
            period_name: "2025-2026".to_string(),
            teachers: Vec::new(),
        };
        let participation = ParticipationReport {
            period_id: 7,
            period_name: "2025-2026".to_string(),
            completed: 0,
            expected: 0,
            rate: 0.0,
            breakdown: ParticipationBreakdown::default(),
        };

        let report = build_report(&results, &participation);
        assert!(report.contains("No evaluation campaigns with expected responses."));
        assert!(report.contains("No teachers hold assignments in this period."));
    }
}
