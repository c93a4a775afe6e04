//! Artifact location with legacy-layout tolerance.
//!
//! Each gate declares an ordered list of candidate path patterns. Candidates
//! are tried in declared order against the workspace root (and the optional
//! external root); the first existing file wins. Absence of any match is a
//! missing-artifact violation for the gate, never a crash.
//!
//! Pattern placeholders:
//! - `{task}`: full identifier (`ENTRY-042`)
//! - `{task_bare}`: discriminator only (`042`)
//! - `{task_underscore}`: legacy underscore form (`042_B`)

use crate::core::config::WorkspaceConfig;
use crate::core::task::TaskId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPolicy {
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Located {
    Found(PathBuf),
    Missing { tried: Vec<PathBuf> },
}

impl ArtifactPolicy {
    pub fn new(candidates: &[&str]) -> Self {
        Self {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Expand pattern placeholders for one task.
    pub fn expand(&self, task: &TaskId) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| {
                c.replace("{task}", task.as_str())
                    .replace("{task_bare}", task.bare())
                    .replace("{task_underscore}", &task.underscored())
            })
            .collect()
    }

    /// First existing candidate wins; no merging of partial matches.
    pub fn locate(&self, config: &WorkspaceConfig, task: &TaskId) -> Located {
        let mut tried = Vec::new();
        for relative in self.expand(task) {
            let mut roots = vec![config.workspace_root.clone()];
            if let Some(external) = &config.external_root {
                roots.push(external.clone());
            }
            for root in roots {
                let path = root.join(&relative);
                if path.is_file() {
                    return Located::Found(path);
                }
                tried.push(path);
            }
        }
        Located::Missing { tried }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn task() -> TaskId {
        TaskId::parse("ENTRY-042").unwrap()
    }

    #[test]
    fn test_expand_placeholders() {
        let policy = ArtifactPolicy::new(&[
            "docs/reports/audit-{task}.md",
            "report_{task_underscore}.md",
        ]);
        let expanded = policy.expand(&task());
        assert_eq!(expanded[0], "docs/reports/audit-ENTRY-042.md");
        assert_eq!(expanded[1], "report_042.md");
    }

    #[test]
    fn test_first_match_wins_over_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        fs::create_dir_all(ws.join("docs/reports")).unwrap();
        fs::write(ws.join("docs/reports/audit-ENTRY-042.md"), "current").unwrap();
        fs::write(ws.join("audit-ENTRY-042.md"), "legacy").unwrap();

        let config = WorkspaceConfig::explicit(ws, &ws.join(".evidence"), "t");
        let policy = ArtifactPolicy::new(&["docs/reports/audit-{task}.md", "audit-{task}.md"]);
        match policy.locate(&config, &task()) {
            Located::Found(p) => assert!(p.ends_with("docs/reports/audit-ENTRY-042.md")),
            Located::Missing { .. } => panic!("expected current layout to win"),
        }
    }

    #[test]
    fn test_missing_reports_all_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::explicit(dir.path(), &dir.path().join(".evidence"), "t");
        let policy = ArtifactPolicy::new(&["a-{task}.md", "b-{task}.md"]);
        match policy.locate(&config, &task()) {
            Located::Missing { tried } => assert_eq!(tried.len(), 2),
            Located::Found(_) => panic!("nothing should exist"),
        }
    }

    #[test]
    fn test_external_root_fallback() {
        let ws = tempfile::tempdir().unwrap();
        let ext = tempfile::tempdir().unwrap();
        fs::write(ext.path().join("audit-ENTRY-042.md"), "x").unwrap();

        let mut config =
            WorkspaceConfig::explicit(ws.path(), &ws.path().join(".evidence"), "t");
        config.external_root = Some(ext.path().to_path_buf());
        let policy = ArtifactPolicy::new(&["audit-{task}.md"]);
        match policy.locate(&config, &task()) {
            Located::Found(p) => assert!(p.starts_with(ext.path())),
            Located::Missing { .. } => panic!("expected external root match"),
        }
    }
}
