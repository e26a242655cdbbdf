//! Participation rates against expected-evaluation denominators.

use crate::models::{ChannelParticipation, ParticipationBreakdown, ParticipationReport};
use crate::scoring::round2;

/// Completed and expected counts for one channel. A channel whose
/// instance was never created contributes nothing at all, so callers
/// pass `None` instead of a zeroed pair.
#[derive(Debug, Clone, Copy)]
pub struct ChannelCounts {
    pub completed: i64,
    pub expected: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelCountSet {
    pub self_eval: Option<ChannelCounts>,
    pub student: Option<ChannelCounts>,
    pub peer: Option<ChannelCounts>,
}

fn channel_participation(counts: ChannelCounts) -> ChannelParticipation {
    ChannelParticipation {
        completed: counts.completed,
        expected: counts.expected,
        rate: round2(counts.completed as f64 / counts.expected as f64 * 100.0),
    }
}

/// Assemble the period report. Channels with `expected == 0` are
/// omitted from the breakdown, never shown as 0/0. The aggregate rate
/// sums completed and expected across the included channels before
/// dividing, so small-denominator channels carry no extra weight.
pub fn assemble_report(
    period_id: i32,
    period_name: String,
    counts: ChannelCountSet,
) -> ParticipationReport {
    let mut breakdown = ParticipationBreakdown::default();
    let mut completed = 0i64;
    let mut expected = 0i64;

    let included = [
        (counts.self_eval, &mut breakdown.self_eval),
        (counts.student, &mut breakdown.student),
        (counts.peer, &mut breakdown.peer),
    ];

    for (channel_counts, slot) in included {
        if let Some(channel_counts) = channel_counts {
            if channel_counts.expected > 0 {
                completed += channel_counts.completed;
                expected += channel_counts.expected;
                *slot = Some(channel_participation(channel_counts));
            }
        }
    }

    let rate = if expected > 0 {
        round2(completed as f64 / expected as f64 * 100.0)
    } else {
        0.0
    };

    ParticipationReport {
        period_id,
        period_name,
        completed,
        expected,
        rate,
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(completed: i64, expected: i64) -> Option<ChannelCounts> {
        Some(ChannelCounts {
            completed,
            expected,
        })
    }

    #[test]
    fn student_channel_rate_matches_completed_over_expected() {
        let report = assemble_report(
            7,
            "2025-2026".to_string(),
            ChannelCountSet {
                student: counts(6, 10),
                ..Default::default()
            },
        );

        let student = report.breakdown.student.expect("student channel present");
        assert_eq!(student.completed, 6);
        assert_eq!(student.expected, 10);
        assert_eq!(student.rate, 60.00);
        assert_eq!(report.rate, 60.00);
    }

    #[test]
    fn aggregate_sums_counts_instead_of_averaging_rates() {
        let report = assemble_report(
            7,
            "2025-2026".to_string(),
            ChannelCountSet {
                self_eval: counts(1, 2),
                student: counts(9, 10),
                ..Default::default()
            },
        );

        // 10 of 12, not the mean of 50 and 90.
        assert_eq!(report.completed, 10);
        assert_eq!(report.expected, 12);
        assert_eq!(report.rate, 83.33);
    }

    #[test]
    fn zero_expected_channel_is_omitted() {
        let report = assemble_report(
            7,
            "2025-2026".to_string(),
            ChannelCountSet {
                self_eval: counts(0, 0),
                peer: counts(3, 4),
                ..Default::default()
            },
        );

        assert!(report.breakdown.self_eval.is_none());
        assert!(report.breakdown.student.is_none());
        assert_eq!(report.expected, 4);
        assert_eq!(report.rate, 75.0);
    }

    #[test]
    fn missing_instance_channel_is_omitted() {
        let report = assemble_report(
            7,
            "2025-2026".to_string(),
            ChannelCountSet {
                self_eval: None,
                student: counts(6, 10),
                peer: None,
            },
        );

        assert!(report.breakdown.self_eval.is_none());
        assert!(report.breakdown.peer.is_none());
        assert_eq!(report.rate, 60.00);
    }

    #[test]
    fn empty_period_reports_zero_without_dividing() {
        let report = assemble_report(7, "2025-2026".to_string(), ChannelCountSet::default());

        assert_eq!(report.completed, 0);
        assert_eq!(report.expected, 0);
        assert_eq!(report.rate, 0.0);
        assert!(report.breakdown.self_eval.is_none());
        assert!(report.breakdown.student.is_none());
        assert!(report.breakdown.peer.is_none());
    }

    #[test]
    fn rates_stay_within_bounds() {
        let report = assemble_report(
            7,
            "2025-2026".to_string(),
            ChannelCountSet {
                self_eval: counts(0, 5),
                student: counts(10, 10),
                ..Default::default()
            },
        );

        let self_eval = report.breakdown.self_eval.expect("self channel present");
        let student = report.breakdown.student.expect("student channel present");
        assert_eq!(self_eval.rate, 0.0);
        assert_eq!(student.rate, 100.0);
        assert!(report.rate >= 0.0 && report.rate <= 100.0);
    }
}
