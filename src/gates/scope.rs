//! Scope-deviation analysis: planned file set (extracted from the plan
//! document) vs actual file set (from the version-control diff).
//!
//! Matching is by exact normalized path OR basename equality, a deliberately
//! loose tie-break that tolerates path-prefix differences between plan text
//! and diff output. `deviation% = (unplanned + missing) / max(planned,
//! actual) * 100`.

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ScopeAnalysis {
    pub matched: Vec<String>,
    pub unplanned: Vec<String>,
    pub missing: Vec<String>,
    pub deviation_percent: f64,
}

/// File patterns excluded from the actual set: expected additions that never
/// count as scope creep.
pub fn is_excluded(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md")
        || lower.ends_with("package-lock.json")
        || lower.ends_with("pnpm-lock.yaml")
        || lower.ends_with("yarn.lock")
        || lower.ends_with("cargo.lock")
        || lower.contains(".test.")
        || lower.contains(".spec.")
        || lower.contains("/tests/")
}

/// Extract planned file paths from plan text: inline code spans, markdown
/// file links, and bare prefixed paths. Deduplicated, in first-seen order.
pub fn extract_planned_files(text: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let cleaned = candidate.trim().trim_start_matches('/').to_string();
        if !cleaned.is_empty() && !files.contains(&cleaned) {
            files.push(cleaned);
        }
    };

    let patterns = [
        // Inline code spans: `src/path/to/file.rs`
        r"`([\w./-]+\.[A-Za-z]{1,5})`",
        // Markdown links: [file.rs](path)
        r"\[([\w./-]+\.[A-Za-z]{1,5})\]",
        // Bare prefixed paths
        r"(?m)(?:^|\s)((?:src|app|lib|crates|pages|components|scripts|docs|tests)/[\w./-]+\.[A-Za-z]{1,5})",
    ];
    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            for capture in re.captures_iter(text) {
                if let Some(m) = capture.get(1) {
                    push(m.as_str());
                }
            }
        }
    }
    files
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_lowercase()
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn matches_any(path: &str, others: &[String]) -> bool {
    let normalized = normalize(path);
    let base = basename(&normalized);
    others.iter().any(|other| {
        let other_norm = normalize(other);
        other_norm == normalized || basename(&other_norm) == base
    })
}

pub fn analyze(planned: &[String], actual: &[String]) -> ScopeAnalysis {
    let mut matched = Vec::new();
    let mut unplanned = Vec::new();
    let mut missing = Vec::new();

    for file in actual {
        if matches_any(file, planned) {
            matched.push(file.clone());
        } else {
            unplanned.push(file.clone());
        }
    }
    for file in planned {
        if !matches_any(file, actual) {
            missing.push(file.clone());
        }
    }

    let total_scope = planned.len().max(actual.len());
    let deviation_percent = if total_scope > 0 {
        (unplanned.len() + missing.len()) as f64 / total_scope as f64 * 100.0
    } else {
        0.0
    };

    ScopeAnalysis {
        matched,
        unplanned,
        missing,
        deviation_percent,
    }
}
