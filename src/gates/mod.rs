//! Gate definitions.
//!
//! Which checks each gate runs is configuration, not code: the built-in
//! registry below is the default chain, and a workspace can declare its own
//! in `gates.toml` (same shape, loaded once at process start). The special
//! algorithms live in the submodules; everything else is validator
//! composition.

pub mod mockcov;
pub mod perf;
pub mod review;
pub mod scope;

use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::gate::{CheckSpec, GateSpec};
use crate::core::locate::ArtifactPolicy;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub gate: Vec<GateSpec>,
}

/// Load the declared chain: `gates.toml` when present, the built-in registry
/// otherwise. Definitions are static once loaded.
pub fn load_chain(config: &WorkspaceConfig) -> Result<Vec<GateSpec>, GatewrightError> {
    let path = config.chain_config_path();
    if path.exists() {
        let content = fs::read_to_string(&path)?;
        let parsed: ChainConfig = toml::from_str(&content)
            .map_err(|e| GatewrightError::ValidationError(format!("gates.toml: {}", e)))?;
        if parsed.gate.is_empty() {
            return Err(GatewrightError::ValidationError(
                "gates.toml declares no gates".to_string(),
            ));
        }
        return Ok(parsed.gate);
    }
    Ok(builtin_registry())
}

pub fn find_gate<'a>(specs: &'a [GateSpec], id: &str) -> Option<&'a GateSpec> {
    specs.iter().find(|spec| spec.id == id)
}

/// The default chain, in unlock order.
pub fn builtin_registry() -> Vec<GateSpec> {
    vec![
        GateSpec {
            id: "audit".to_string(),
            title: "Physical Audit".to_string(),
            artifact: Some(ArtifactPolicy::new(&[
                "docs/reports/physical-audit-{task}.md",
                "docs/reports/phase_1_assessment_report_TASK_{task_underscore}.md",
                "physical-audit-{task}.md",
            ])),
            checks: vec![
                CheckSpec::Freshness,
                CheckSpec::Section {
                    any_of: vec!["Current State".to_string(), "Analysis".to_string()],
                },
                CheckSpec::Section {
                    any_of: vec!["Production State".to_string()],
                },
                CheckSpec::Density {
                    min_words: 0,
                    min_lines: 50,
                },
                CheckSpec::NoPlaceholders { markers: Vec::new() },
            ],
        },
        GateSpec {
            id: "research".to_string(),
            title: "External Research".to_string(),
            artifact: Some(ArtifactPolicy::new(&[
                "docs/research/{task}-research.md",
                "research-{task}.md",
            ])),
            checks: vec![
                CheckSpec::Count {
                    pattern: r"##\s+Search\s+#\d+".to_string(),
                    min: 3,
                    label: "documented searches".to_string(),
                },
                CheckSpec::Count {
                    pattern: r"Source:\s*\[.+?\]\(.+?\)".to_string(),
                    min: 5,
                    label: "cited sources".to_string(),
                },
                CheckSpec::Count {
                    pattern: r"https?://".to_string(),
                    min: 3,
                    label: "external links".to_string(),
                },
                CheckSpec::Count {
                    pattern: r"Key\s+Finding".to_string(),
                    min: 1,
                    label: "key findings".to_string(),
                },
                CheckSpec::Section {
                    any_of: vec![r"Alternatives?\s+Considered".to_string()],
                },
                CheckSpec::Density {
                    min_words: 1000,
                    min_lines: 0,
                },
                CheckSpec::Variety { min_ratio: 0.4 },
            ],
        },
        GateSpec {
            id: "plan".to_string(),
            title: "Implementation Plan & Scope".to_string(),
            artifact: Some(ArtifactPolicy::new(&[
                "docs/implementation/plans/{task}-plan.md",
                "implementation-plan-{task}.md",
            ])),
            checks: vec![
                CheckSpec::Section {
                    any_of: vec![r"Success\s+Metric".to_string()],
                },
                CheckSpec::Section {
                    any_of: vec![r"Failure\s+Signal".to_string()],
                },
                CheckSpec::NoPlaceholders { markers: Vec::new() },
                CheckSpec::Scope {
                    threshold: 30.0,
                    waiver_sections: Vec::new(),
                },
            ],
        },
        GateSpec {
            id: "lint".to_string(),
            title: "Lint".to_string(),
            artifact: None,
            checks: vec![CheckSpec::Tool {
                name: "lint".to_string(),
                command: vec!["npm".to_string(), "run".to_string(), "lint".to_string()],
            }],
        },
        GateSpec {
            id: "tests".to_string(),
            title: "Tests & Mock Coverage".to_string(),
            artifact: None,
            checks: vec![
                CheckSpec::Tool {
                    name: "tests".to_string(),
                    command: vec!["npm".to_string(), "test".to_string()],
                },
                CheckSpec::MockCoverage { signatures: Vec::new() },
            ],
        },
        GateSpec {
            id: "security".to_string(),
            title: "Security Audit".to_string(),
            artifact: None,
            checks: vec![CheckSpec::Tool {
                name: "security".to_string(),
                command: vec![
                    "npm".to_string(),
                    "audit".to_string(),
                    "--audit-level=high".to_string(),
                ],
            }],
        },
        GateSpec {
            id: "performance".to_string(),
            title: "Performance (Median)".to_string(),
            artifact: None,
            checks: vec![CheckSpec::MedianPerf {
                command: vec![
                    "lighthouse".to_string(),
                    "http://localhost:3000".to_string(),
                    "--output=json".to_string(),
                    "--quiet".to_string(),
                ],
                score_pointer: "/categories/performance/score".to_string(),
                baseline: 0.8,
                runs: perf::DEFAULT_RUNS,
            }],
        },
        GateSpec {
            id: "production".to_string(),
            title: "Production Verification".to_string(),
            artifact: Some(ArtifactPolicy::new(&[
                "docs/reports/production-verification-{task}.md",
                "docs/reports/production_verification_TASK_{task_underscore}.md",
                "docs/reports/production_verification_TASK_{task}.md",
            ])),
            checks: vec![
                CheckSpec::Freshness,
                CheckSpec::Section {
                    any_of: vec![r"Deployment\s+(ID|Timestamp|Time)".to_string()],
                },
                CheckSpec::Section {
                    any_of: vec![r"Health\s+Check".to_string()],
                },
                CheckSpec::Reachable,
                CheckSpec::FileRef {
                    pattern: r"(?:docs|screenshots?)/[\w./-]+-mobile\.(?:png|jpe?g|webp)".to_string(),
                    min_bytes: 5000,
                },
                CheckSpec::FileRef {
                    pattern: r"(?:docs|screenshots?)/[\w./-]+-desktop\.(?:png|jpe?g|webp)"
                        .to_string(),
                    min_bytes: 5000,
                },
                CheckSpec::Checklist {
                    section: r"Manual\s+Verification|Live\s+Browser|Production\s+Checklist"
                        .to_string(),
                },
                CheckSpec::Numeric {
                    claim: r"console\s+errors?".to_string(),
                },
            ],
        },
        GateSpec {
            id: "docs".to_string(),
            title: "Documentation Completeness".to_string(),
            artifact: Some(ArtifactPolicy::new(&[
                "docs/reports/completion-report-{task}.md",
                "{task}-completion-report.md",
            ])),
            checks: vec![
                CheckSpec::NoPlaceholders { markers: Vec::new() },
                CheckSpec::Density {
                    min_words: 800,
                    min_lines: 0,
                },
                CheckSpec::Count {
                    pattern: r"(?s)```.+?```".to_string(),
                    min: 1,
                    label: "code snippets".to_string(),
                },
                CheckSpec::Count {
                    pattern: r"`[\w./-]+\.(rs|ts|tsx|js|jsx|md|json)`".to_string(),
                    min: 2,
                    label: "file path references".to_string(),
                },
                CheckSpec::Section {
                    any_of: vec!["Test Results".to_string(), "Testing".to_string()],
                },
                CheckSpec::Numeric {
                    claim: r"tests?|passed|failed|coverage|assertions?".to_string(),
                },
                CheckSpec::Section {
                    any_of: vec!["Implementation".to_string(), "Changes Made".to_string()],
                },
                CheckSpec::CommitTrail { min: 1 },
            ],
        },
        GateSpec {
            id: "approval".to_string(),
            title: "Reviewer Approval".to_string(),
            artifact: None,
            checks: vec![CheckSpec::PrApproval {
                token: review::APPROVAL_TOKEN.to_string(),
            }],
        },
    ]
}
