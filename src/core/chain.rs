//! Ordered, dependency-respecting gate chain.
//!
//! A single piece of state, `last_passed` (−1 = nothing unlocked), is
//! recomputed every cycle by re-evaluating gates from the front of the chain
//! up to the first failure. Gate N cannot be attempted until gate N−1 has
//! most recently passed. The loop is level-triggered: a gate that silently
//! regresses after passing is caught on the very next cycle, and its
//! regression revokes downstream unlocking (`last_passed = i − 1`).

use crate::core::error::GatewrightError;
use crate::core::gate::GateSpec;
use serde::Serialize;

/// Evaluation seam for the chain: the production implementation evaluates
/// and records through the gate evaluator; tests substitute outcomes.
pub trait GateEval {
    fn evaluate(&mut self, index: usize, spec: &GateSpec) -> Result<bool, GatewrightError>;
}

impl<F> GateEval for F
where
    F: FnMut(usize, &GateSpec) -> Result<bool, GatewrightError>,
{
    fn evaluate(&mut self, index: usize, spec: &GateSpec) -> Result<bool, GatewrightError> {
        self(index, spec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    /// Most recently evaluated and passed.
    Passed,
    /// Evaluated this cycle and failed; the chain stops here.
    Blocked,
    /// Not reachable given current chain state: "you haven't gotten here
    /// yet", distinct from "you failed here".
    Locked,
}

#[derive(Debug, Clone)]
pub struct ChainState {
    /// Highest index that has most recently passed; −1 means nothing
    /// unlocked. Volatile: reset each process start.
    pub last_passed: i64,
}

impl ChainState {
    pub fn new() -> Self {
        Self { last_passed: -1 }
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub standings: Vec<(String, Standing)>,
    pub last_passed: i64,
}

impl CycleReport {
    pub fn all_passed(&self) -> bool {
        self.standings
            .iter()
            .all(|(_, standing)| *standing == Standing::Passed)
    }
}

/// One evaluation cycle over the declared gate order. Errors from the
/// evaluator (notably integrity failures) abort the cycle and propagate.
pub fn cycle(
    specs: &[GateSpec],
    state: &mut ChainState,
    eval: &mut dyn GateEval,
) -> Result<CycleReport, GatewrightError> {
    let mut standings: Vec<(String, Standing)> = Vec::with_capacity(specs.len());
    let mut stopped = false;

    for (index, spec) in specs.iter().enumerate() {
        if stopped || index as i64 > state.last_passed + 1 {
            standings.push((spec.id.clone(), Standing::Locked));
            stopped = true;
            continue;
        }
        if eval.evaluate(index, spec)? {
            if index as i64 > state.last_passed {
                state.last_passed = index as i64;
            }
            standings.push((spec.id.clone(), Standing::Passed));
        } else {
            state.last_passed = index as i64 - 1;
            standings.push((spec.id.clone(), Standing::Blocked));
            stopped = true;
        }
    }

    Ok(CycleReport {
        standings,
        last_passed: state.last_passed,
    })
}

/// Poll-loop supervisor with explicit non-overlapping cycle enforcement:
/// a cycle requested while one is in progress is dropped, never pipelined.
pub struct ChainRunner {
    state: ChainState,
    cycle_in_progress: bool,
}

impl ChainRunner {
    pub fn new() -> Self {
        Self {
            state: ChainState::new(),
            cycle_in_progress: false,
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Run one cycle, or return None when a cycle is already in progress.
    pub fn run_cycle(
        &mut self,
        specs: &[GateSpec],
        eval: &mut dyn GateEval,
    ) -> Result<Option<CycleReport>, GatewrightError> {
        if self.cycle_in_progress {
            return Ok(None);
        }
        self.cycle_in_progress = true;
        let result = cycle(specs, &mut self.state, eval);
        self.cycle_in_progress = false;
        result.map(Some)
    }
}

impl Default for ChainRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(n: usize) -> Vec<GateSpec> {
        (0..n)
            .map(|i| GateSpec {
                id: format!("gate-{}", i),
                title: format!("Gate {}", i),
                artifact: None,
                checks: Vec::new(),
            })
            .collect()
    }

    struct Scripted {
        outcomes: Vec<bool>,
        calls: Vec<usize>,
    }

    impl GateEval for Scripted {
        fn evaluate(&mut self, index: usize, _spec: &GateSpec) -> Result<bool, GatewrightError> {
            self.calls.push(index);
            Ok(self.outcomes[index])
        }
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let specs = specs(5);
        let mut state = ChainState::new();
        let mut eval = Scripted {
            outcomes: vec![true, true, false, true, true],
            calls: Vec::new(),
        };
        let report = cycle(&specs, &mut state, &mut eval).unwrap();
        assert_eq!(state.last_passed, 1);
        assert_eq!(eval.calls, vec![0, 1, 2]);
        assert_eq!(
            report.standings.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            vec![
                Standing::Passed,
                Standing::Passed,
                Standing::Blocked,
                Standing::Locked,
                Standing::Locked
            ]
        );
    }

    #[test]
    fn test_regression_revokes_downstream_unlocking() {
        let specs = specs(3);
        let mut state = ChainState::new();

        let mut all_pass = Scripted {
            outcomes: vec![true, true, true],
            calls: Vec::new(),
        };
        let report = cycle(&specs, &mut state, &mut all_pass).unwrap();
        assert_eq!(state.last_passed, 2);
        assert!(report.all_passed());

        // Previously-passed gate 1 starts failing: last_passed drops to 0
        // and gate 2 is no longer evaluated.
        let mut regressed = Scripted {
            outcomes: vec![true, false, true],
            calls: Vec::new(),
        };
        let report = cycle(&specs, &mut state, &mut regressed).unwrap();
        assert_eq!(state.last_passed, 0);
        assert_eq!(regressed.calls, vec![0, 1]);
        assert_eq!(report.standings[2].1, Standing::Locked);
    }

    #[test]
    fn test_last_passed_never_skips_past_first_failure() {
        let specs = specs(4);
        let mut state = ChainState::new();
        let mut eval = Scripted {
            outcomes: vec![false, true, true, true],
            calls: Vec::new(),
        };
        let report = cycle(&specs, &mut state, &mut eval).unwrap();
        assert_eq!(state.last_passed, -1);
        assert_eq!(eval.calls, vec![0]);
        assert_eq!(report.standings[0].1, Standing::Blocked);
        assert!(
            report.standings[1..]
                .iter()
                .all(|(_, s)| *s == Standing::Locked)
        );
    }

    #[test]
    fn test_level_triggered_reevaluates_from_front() {
        let specs = specs(2);
        let mut state = ChainState::new();
        let mut eval = Scripted {
            outcomes: vec![true, true],
            calls: Vec::new(),
        };
        cycle(&specs, &mut state, &mut eval).unwrap();
        cycle(&specs, &mut state, &mut eval).unwrap();
        // both cycles walked the whole chain from gate 0
        assert_eq!(eval.calls, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_integrity_error_aborts_cycle() {
        let specs = specs(2);
        let mut state = ChainState::new();
        let mut eval = |_i: usize, _s: &GateSpec| -> Result<bool, GatewrightError> {
            Err(GatewrightError::IntegrityError("tampered".to_string()))
        };
        let err = cycle(&specs, &mut state, &mut eval).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_runner_drops_overlapping_cycle() {
        let specs = specs(1);
        let mut runner = ChainRunner::new();
        runner.cycle_in_progress = true;
        let mut eval = |_i: usize, _s: &GateSpec| Ok(true);
        let report = runner.run_cycle(&specs, &mut eval).unwrap();
        assert!(report.is_none());
    }
}
