//! Per-gate evaluation.
//!
//! One evaluation walks LOCATING -> VALIDATING -> AGGREGATING and terminates
//! in PASSED or BLOCKED; there are no retries inside an invocation, a caller
//! re-runs the whole evaluator to re-attempt. Given the same artifacts and
//! the same external-probe outputs, the evaluator produces the same verdict;
//! live probes are the only legitimate source of run-to-run variance.
//!
//! Which checks a gate runs is declarative configuration ([`CheckSpec`]),
//! not per-gate code forks.

use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::evidence::{EvidenceStore, Outcome, Ticket, Verdict, Violation};
use crate::core::locate::{ArtifactPolicy, Located};
use crate::core::probe::{self, GitProbe, PrProbe, ProbeStatus};
use crate::core::task::TaskId;
use crate::core::time;
use crate::core::validators::{
    CheckContext, CheckResult, ChecklistComplete, CountAtLeast, Document, ExternalReachability,
    FreshnessAnchor, MinimumDensity, NumericEvidence, PlaceholderAbsence, ReferencedFileExists,
    SectionPresence, Validator, VocabularyVariety,
};
use crate::gates::{mockcov, perf, review, scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_min_bytes() -> u64 {
    5000
}
fn default_variety_ratio() -> f64 {
    0.4
}
fn default_scope_threshold() -> f64 {
    30.0
}
fn default_perf_baseline() -> f64 {
    80.0
}
fn default_perf_runs() -> usize {
    perf::DEFAULT_RUNS
}
fn default_approval_token() -> String {
    review::APPROVAL_TOKEN.to_string()
}
fn default_commit_min() -> usize {
    1
}

/// One declared check. Document predicates map onto the validator library;
/// the remaining variants carry the gate algorithms that need probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckSpec {
    Section {
        any_of: Vec<String>,
    },
    Freshness,
    Density {
        #[serde(default)]
        min_words: usize,
        #[serde(default)]
        min_lines: usize,
    },
    NoPlaceholders {
        #[serde(default)]
        markers: Vec<String>,
    },
    Checklist {
        section: String,
    },
    Numeric {
        claim: String,
    },
    FileRef {
        pattern: String,
        #[serde(default = "default_min_bytes")]
        min_bytes: u64,
    },
    Reachable,
    Count {
        pattern: String,
        min: usize,
        label: String,
    },
    Variety {
        #[serde(default = "default_variety_ratio")]
        min_ratio: f64,
    },
    /// External tool whose exit status is the check (lint, tests, audit).
    Tool {
        name: String,
        command: Vec<String>,
    },
    Scope {
        #[serde(default = "default_scope_threshold")]
        threshold: f64,
        #[serde(default)]
        waiver_sections: Vec<String>,
    },
    MedianPerf {
        command: Vec<String>,
        score_pointer: String,
        #[serde(default = "default_perf_baseline")]
        baseline: f64,
        #[serde(default = "default_perf_runs")]
        runs: usize,
    },
    MockCoverage {
        #[serde(default)]
        signatures: Vec<String>,
    },
    PrApproval {
        #[serde(default = "default_approval_token")]
        token: String,
    },
    /// Commit messages must reference the task id: work was actually
    /// committed under this task, not just documented.
    CommitTrail {
        #[serde(default = "default_commit_min")]
        min: usize,
    },
}

/// Static gate definition: loaded once at process start, never mutated.
/// Chain order is the declared order of the gate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artifact: Option<ArtifactPolicy>,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

/// Gate-specific invocation arguments.
#[derive(Debug, Clone, Default)]
pub struct EvalArgs {
    pub pr: Option<u64>,
    pub base_ref: Option<String>,
}

#[derive(Default)]
struct Collected {
    violations: Vec<Violation>,
    warnings: Vec<String>,
    metrics: BTreeMap<String, serde_json::Value>,
}

pub struct Evaluator {
    config: WorkspaceConfig,
    store: EvidenceStore,
    revision_override: Option<String>,
}

impl Evaluator {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            config: config.clone(),
            store: EvidenceStore::new(config),
            revision_override: None,
        }
    }

    /// Pin the revision used for freshness anchoring instead of probing
    /// version control. Used by embedding callers and tests.
    pub fn with_revision(mut self, revision: &str) -> Self {
        self.revision_override = Some(revision.to_string());
        self
    }

    pub fn store(&self) -> &EvidenceStore {
        &self.store
    }

    /// Evaluate one gate without side effects.
    pub fn evaluate(
        &self,
        spec: &GateSpec,
        task: &TaskId,
        args: &EvalArgs,
    ) -> Result<Verdict, GatewrightError> {
        let mut collected = Collected::default();

        // LOCATING
        let document = match &spec.artifact {
            Some(policy) => match policy.locate(&self.config, task) {
                Located::Found(path) => Some(Document::load(&path)?),
                Located::Missing { tried } => {
                    let candidates = tried
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    collected.violations.push(Violation::with_evidence(
                        format!(
                            "required artifact for gate '{}' not found; create one of the checked paths",
                            spec.id
                        ),
                        candidates,
                    ));
                    None
                }
            },
            None => None,
        };
        let artifact_declared = spec.artifact.is_some();

        // VALIDATING
        let head = match &self.revision_override {
            Some(rev) => Some(rev.clone()),
            None => GitProbe::new(&self.config.workspace_root).current_revision(),
        };
        let cx = CheckContext {
            config: &self.config,
            head,
            http_timeout: probe::PROBE_TIMEOUT,
        };

        for check in &spec.checks {
            self.run_check(
                check,
                document.as_ref(),
                artifact_declared,
                &cx,
                args,
                task,
                &mut collected,
            );
        }

        // AGGREGATING
        let outcome = if collected.violations.is_empty() {
            Outcome::Pass
        } else {
            Outcome::Blocked
        };

        Ok(Verdict {
            gate: spec.id.clone(),
            task: task.as_str().to_string(),
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            outcome,
            violations: collected.violations,
            warnings: collected.warnings,
            metrics: collected.metrics,
        })
    }

    /// Evaluate and persist: the verdict record always, the evidence ticket
    /// and ledger row only on PASS.
    pub fn evaluate_and_record(
        &self,
        spec: &GateSpec,
        task: &TaskId,
        args: &EvalArgs,
    ) -> Result<(Verdict, Option<Ticket>), GatewrightError> {
        let verdict = self.evaluate(spec, task, args)?;
        let ticket = self.store.record(&verdict, task)?;
        Ok((verdict, ticket))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_check(
        &self,
        check: &CheckSpec,
        document: Option<&Document>,
        artifact_declared: bool,
        cx: &CheckContext,
        args: &EvalArgs,
        task: &TaskId,
        out: &mut Collected,
    ) {
        match check {
            CheckSpec::Section { any_of } => self.doc_check(
                &SectionPresence {
                    any_of: any_of.clone(),
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::Freshness => {
                self.doc_check(&FreshnessAnchor, document, artifact_declared, cx, out)
            }
            CheckSpec::Density {
                min_words,
                min_lines,
            } => self.doc_check(
                &MinimumDensity {
                    min_words: *min_words,
                    min_lines: *min_lines,
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::NoPlaceholders { markers } => {
                let markers = if markers.is_empty() {
                    PlaceholderAbsence::default_markers()
                } else {
                    markers.clone()
                };
                self.doc_check(
                    &PlaceholderAbsence { markers },
                    document,
                    artifact_declared,
                    cx,
                    out,
                )
            }
            CheckSpec::Checklist { section } => self.doc_check(
                &ChecklistComplete {
                    section: section.clone(),
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::Numeric { claim } => self.doc_check(
                &NumericEvidence {
                    claim: claim.clone(),
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::FileRef { pattern, min_bytes } => self.doc_check(
                &ReferencedFileExists {
                    pattern: pattern.clone(),
                    min_bytes: *min_bytes,
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::Reachable => {
                self.doc_check(&ExternalReachability, document, artifact_declared, cx, out)
            }
            CheckSpec::Count {
                pattern,
                min,
                label,
            } => self.doc_check(
                &CountAtLeast {
                    pattern: pattern.clone(),
                    min: *min,
                    label: label.clone(),
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::Variety { min_ratio } => self.doc_check(
                &VocabularyVariety {
                    min_ratio: *min_ratio,
                },
                document,
                artifact_declared,
                cx,
                out,
            ),
            CheckSpec::Tool { name, command } => self.run_tool_check(name, command, out),
            CheckSpec::Scope {
                threshold,
                waiver_sections,
            } => self.run_scope_check(document, *threshold, waiver_sections, args, out),
            CheckSpec::MedianPerf {
                command,
                score_pointer,
                baseline,
                runs,
            } => self.run_perf_check(command, score_pointer, *baseline, *runs, out),
            CheckSpec::MockCoverage { signatures } => self.run_mockcov_check(signatures, out),
            CheckSpec::PrApproval { token } => self.run_approval_check(token, args, out),
            CheckSpec::CommitTrail { min } => self.run_commit_trail_check(*min, task, out),
        }
    }

    fn doc_check(
        &self,
        validator: &dyn Validator,
        document: Option<&Document>,
        artifact_declared: bool,
        cx: &CheckContext,
        out: &mut Collected,
    ) {
        let Some(doc) = document else {
            // Missing artifact was already recorded as a violation; a gate
            // that declares no artifact but lists document checks is a
            // configuration mistake worth surfacing.
            if !artifact_declared {
                out.warnings.push(format!(
                    "check '{}' skipped: gate declares no artifact",
                    validator.label()
                ));
            }
            return;
        };
        match validator.check(doc, cx) {
            CheckResult::Pass { .. } => {}
            CheckResult::Fail { detail } => out.violations.push(Violation::with_evidence(
                detail,
                doc.path.display().to_string(),
            )),
            CheckResult::Warn { detail } => out.warnings.push(detail),
        }
    }

    fn run_tool_check(&self, name: &str, command: &[String], out: &mut Collected) {
        if command.is_empty() {
            out.violations
                .push(Violation::new(format!("tool check '{}' has no command", name)));
            return;
        }
        let args: Vec<&str> = command[1..].iter().map(|s| s.as_str()).collect();
        let status = probe::run_tool(
            &command[0],
            &args,
            &self.config.workspace_root,
            probe::PROBE_TIMEOUT,
        );
        match status {
            ProbeStatus::Ran(outcome) if outcome.success => {
                out.metrics
                    .insert(format!("{}_exit_code", name), serde_json::json!(0));
            }
            ProbeStatus::Ran(outcome) => {
                out.metrics.insert(
                    format!("{}_exit_code", name),
                    serde_json::json!(outcome.exit_code),
                );
                out.violations.push(Violation::with_evidence(
                    format!("{} reported problems (exit {})", name, outcome.exit_code),
                    crate::core::output::compact_line(&outcome.raw_output, 400),
                ));
            }
            ProbeStatus::Unavailable(why) => {
                // Degraded mode: never a silent pass, never a false block.
                out.metrics
                    .insert(format!("{}_estimated", name), serde_json::json!(true));
                out.warnings
                    .push(format!("{} unavailable, recording estimated result: {}", name, why));
            }
        }
    }

    fn run_scope_check(
        &self,
        document: Option<&Document>,
        threshold: f64,
        waiver_sections: &[String],
        args: &EvalArgs,
        out: &mut Collected,
    ) {
        let Some(doc) = document else {
            return;
        };
        let planned = scope::extract_planned_files(&doc.text);
        let actual: Vec<String> = match GitProbe::new(&self.config.workspace_root)
            .changed_paths(args.base_ref.as_deref())
        {
            Some(paths) => paths
                .into_iter()
                .filter(|p| !scope::is_excluded(p))
                .collect(),
            None => {
                out.violations.push(Violation::new(
                    "could not determine changed paths from version control",
                ));
                return;
            }
        };

        let analysis = scope::analyze(&planned, &actual);
        out.metrics
            .insert("planned_files".to_string(), serde_json::json!(planned.len()));
        out.metrics
            .insert("actual_files".to_string(), serde_json::json!(actual.len()));
        out.metrics.insert(
            "matched_files".to_string(),
            serde_json::json!(analysis.matched.len()),
        );
        out.metrics.insert(
            "unplanned_files".to_string(),
            serde_json::json!(analysis.unplanned.len()),
        );
        out.metrics.insert(
            "missing_files".to_string(),
            serde_json::json!(analysis.missing.len()),
        );
        out.metrics.insert(
            "deviation_percent".to_string(),
            serde_json::json!((analysis.deviation_percent * 10.0).round() / 10.0),
        );

        if analysis.deviation_percent > threshold {
            let waivers = if waiver_sections.is_empty() {
                vec![
                    r"Scope\s+Changes?".to_string(),
                    r"Deviations?".to_string(),
                ]
            } else {
                waiver_sections.to_vec()
            };
            let waived = waivers.iter().any(|section| {
                regex::RegexBuilder::new(&format!(r"(?m)^#{{1,3}}\s*.*{}", section))
                    .case_insensitive(true)
                    .build()
                    .map(|re| re.is_match(&doc.text))
                    .unwrap_or(false)
            });
            if !waived {
                let mut evidence = Vec::new();
                if !analysis.unplanned.is_empty() {
                    evidence.push(format!("unplanned: {}", analysis.unplanned.join(", ")));
                }
                if !analysis.missing.is_empty() {
                    evidence.push(format!("missing: {}", analysis.missing.join(", ")));
                }
                out.violations.push(Violation::with_evidence(
                    format!(
                        "{:.1}% scope deviation without explanation (threshold {:.0}%); \
                         add a 'Scope Changes' section to the plan or align the diff",
                        analysis.deviation_percent, threshold
                    ),
                    evidence.join("; "),
                ));
            }
        }
    }

    fn run_perf_check(
        &self,
        command: &[String],
        score_pointer: &str,
        baseline: f64,
        runs: usize,
        out: &mut Collected,
    ) {
        match perf::run(command, score_pointer, baseline, runs, &self.config.workspace_root) {
            perf::PerfResult::Measured(summary) => {
                out.metrics
                    .insert("perf_runs".to_string(), serde_json::json!(summary.runs));
                out.metrics
                    .insert("perf_median".to_string(), serde_json::json!(summary.median));
                out.metrics
                    .insert("perf_baseline".to_string(), serde_json::json!(baseline));
                if summary.median < baseline {
                    out.violations.push(Violation::new(format!(
                        "median performance score {} below baseline {} (runs: {:?})",
                        summary.median, baseline, summary.runs
                    )));
                }
            }
            perf::PerfResult::Unavailable { why, summary } => {
                out.metrics
                    .insert("perf_estimated".to_string(), serde_json::json!(true));
                out.metrics
                    .insert("perf_median".to_string(), serde_json::json!(summary.median));
                out.warnings.push(format!(
                    "performance tool unavailable, recording estimated median: {}",
                    why
                ));
            }
            perf::PerfResult::Unscorable { raw } => {
                out.violations.push(Violation::with_evidence(
                    "performance tool produced no parseable score",
                    raw,
                ));
            }
        }
    }

    fn run_mockcov_check(&self, signatures: &[String], out: &mut Collected) {
        let signatures = if signatures.is_empty() {
            mockcov::default_signatures()
        } else {
            signatures.to_vec()
        };
        match mockcov::audit(&self.config.workspace_root, &signatures) {
            Ok(findings) => {
                out.metrics.insert(
                    "integrations_referenced".to_string(),
                    serde_json::json!(findings.len()),
                );
                for finding in findings {
                    if finding.fully_mocked() {
                        let detail = if finding.tested_in.is_empty() {
                            format!(
                                "integration '{}' is referenced ({}) but has no associated test",
                                finding.signature,
                                finding.referenced_in.join(", ")
                            )
                        } else {
                            format!(
                                "integration '{}' is only covered by fully-mocked tests ({}); \
                                 at least one test must exercise it for real",
                                finding.signature,
                                finding.tested_in.join(", ")
                            )
                        };
                        out.violations.push(Violation::new(detail));
                    }
                }
            }
            Err(e) => out
                .violations
                .push(Violation::new(format!("integration audit failed: {}", e))),
        }
    }

    fn run_commit_trail_check(&self, min: usize, task: &TaskId, out: &mut Collected) {
        let commits =
            GitProbe::new(&self.config.workspace_root).commits_matching(task.as_str());
        out.metrics.insert(
            "task_commits".to_string(),
            serde_json::json!(commits.len()),
        );
        if commits.len() < min {
            out.violations.push(Violation::new(format!(
                "only {} commit(s) reference {} (need {}+); commit the work under its task id",
                commits.len(),
                task,
                min
            )));
        }
    }

    fn run_approval_check(&self, token: &str, args: &EvalArgs, out: &mut Collected) {
        let Some(pr) = args.pr else {
            out.violations.push(Violation::new(
                "approval gate needs a PR number (pass --pr)",
            ));
            return;
        };
        let probe = PrProbe::new(&self.config.workspace_root);
        let (audit, violations) = review::audit(&probe, pr, token);
        out.metrics
            .insert("pr".to_string(), serde_json::json!(audit.pr));
        out.metrics.insert(
            "pr_comments".to_string(),
            serde_json::json!(audit.comment_count),
        );
        if let Some(author) = &audit.approved_by {
            out.metrics
                .insert("approved_by".to_string(), serde_json::json!(author));
        }
        out.violations.extend(violations);
    }
}
