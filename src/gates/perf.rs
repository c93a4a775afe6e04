//! Median-based performance scoring.
//!
//! The performance probe runs a fixed number of times and the gate compares
//! the sorted-middle score (not mean, not max) against the baseline. The
//! median resists cherry-picking a lucky run and represents what a typical
//! run actually sees.

use crate::core::probe::{self, ProbeStatus};
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_RUNS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct PerfSummary {
    pub runs: Vec<f64>,
    pub median: f64,
    pub baseline: f64,
    pub estimated: bool,
}

/// Sorted-middle element. None for an empty slice.
pub fn median(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}

pub enum PerfResult {
    Measured(PerfSummary),
    /// Tool could not be invoked: a clearly-marked estimate plus a warning,
    /// never a silent pass.
    Unavailable { why: String, summary: PerfSummary },
    /// Tool ran but produced no parseable score.
    Unscorable { raw: String },
}

pub fn run(
    command: &[String],
    score_pointer: &str,
    baseline: f64,
    runs: usize,
    cwd: &Path,
) -> PerfResult {
    let mut scores = Vec::new();
    for _ in 0..runs.max(1) {
        let status = match probe::run_scored_tool(command, score_pointer, cwd) {
            Ok(s) => s,
            Err(e) => {
                return PerfResult::Unavailable {
                    why: e.to_string(),
                    summary: estimated_summary(baseline),
                };
            }
        };
        match status {
            ProbeStatus::Unavailable(why) => {
                return PerfResult::Unavailable {
                    why,
                    summary: estimated_summary(baseline),
                };
            }
            ProbeStatus::Ran(outcome) => {
                match outcome.metrics.get("score").and_then(|s| s.as_f64()) {
                    Some(score) => scores.push(score),
                    None => {
                        return PerfResult::Unscorable {
                            raw: crate::core::output::compact_line(&outcome.raw_output, 200),
                        };
                    }
                }
            }
        }
    }
    let median = median(&scores).unwrap_or(0.0);
    PerfResult::Measured(PerfSummary {
        runs: scores,
        median,
        baseline,
        estimated: false,
    })
}

fn estimated_summary(baseline: f64) -> PerfSummary {
    PerfSummary {
        runs: Vec::new(),
        median: baseline,
        baseline,
        estimated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_is_sorted_middle_not_mean_or_max() {
        // sorted = [60, 70, 80, 90, 95] -> median 80; mean would be 79, max 95
        let scores = [70.0, 95.0, 80.0, 60.0, 90.0];
        assert_eq!(median(&scores), Some(80.0));
        let mean: f64 = scores.iter().sum::<f64>() / scores.len() as f64;
        assert_eq!(mean, 79.0);
        assert_ne!(median(&scores), Some(mean));
        assert_ne!(median(&scores), Some(95.0));
    }

    #[test]
    fn test_median_even_count_takes_upper_middle() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), Some(30.0));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_unavailable_tool_yields_marked_estimate() {
        let command = vec!["definitely-not-a-real-perf-tool-77".to_string()];
        match run(&command, "/score", 80.0, 3, Path::new(".")) {
            PerfResult::Unavailable { summary, .. } => {
                assert!(summary.estimated);
                assert_eq!(summary.median, 80.0);
            }
            _ => panic!("expected unavailable"),
        }
    }
}
