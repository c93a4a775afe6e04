//! Workspace configuration for gate runs.
//!
//! All artifact lookups and evidence writes are rooted here instead of in
//! hard-coded relative paths. Environment overrides:
//! - `GATEWRIGHT_WORKSPACE_ROOT`: base path for artifact lookups (default cwd)
//! - `GATEWRIGHT_EVIDENCE_ROOT`: verdicts/tickets/ledger root (default `<ws>/.evidence`)
//! - `GATEWRIGHT_EXTERNAL_ROOT`: optional secondary artifact search root
//! - `GATEWRIGHT_ACTOR`: actor recorded on evidence tickets (default `$USER`)

use crate::core::error::GatewrightError;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Base path for all relative artifact lookups.
    pub workspace_root: PathBuf,
    /// Base path for verdict reports, tickets, and the ledger.
    pub evidence_root: PathBuf,
    /// Optional secondary search path for cross-workstation artifact lookup.
    pub external_root: Option<PathBuf>,
    /// Actor recorded on evidence tickets.
    pub actor: String,
}

impl WorkspaceConfig {
    pub fn from_env() -> Result<Self, GatewrightError> {
        let workspace_root = match env::var_os("GATEWRIGHT_WORKSPACE_ROOT") {
            Some(p) => PathBuf::from(p),
            None => env::current_dir()?,
        };
        Ok(Self::rooted_at(workspace_root))
    }

    pub fn rooted_at(workspace_root: PathBuf) -> Self {
        let evidence_root = env::var_os("GATEWRIGHT_EVIDENCE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace_root.join(".evidence"));
        let external_root = env::var_os("GATEWRIGHT_EXTERNAL_ROOT").map(PathBuf::from);
        let actor = env::var("GATEWRIGHT_ACTOR")
            .or_else(|_| env::var("USER"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            workspace_root,
            evidence_root,
            external_root,
            actor,
        }
    }

    /// Config with explicit roots and actor, bypassing the environment.
    /// Used by tests and embedded callers.
    pub fn explicit(workspace_root: &Path, evidence_root: &Path, actor: &str) -> Self {
        Self {
            workspace_root: workspace_root.to_path_buf(),
            evidence_root: evidence_root.to_path_buf(),
            external_root: None,
            actor: actor.to_string(),
        }
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.evidence_root.join("reports")
    }

    pub fn tickets_dir(&self) -> PathBuf {
        self.evidence_root.join("tickets")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.evidence_root.join("ledger.csv")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.workspace_root.join("integrity-manifest.json")
    }

    pub fn chain_config_path(&self) -> PathBuf {
        self.workspace_root.join("gates.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_roots() {
        let cfg = WorkspaceConfig::explicit(Path::new("/ws"), Path::new("/ev"), "tester");
        assert_eq!(cfg.reports_dir(), PathBuf::from("/ev/reports"));
        assert_eq!(cfg.tickets_dir(), PathBuf::from("/ev/tickets"));
        assert_eq!(cfg.ledger_path(), PathBuf::from("/ev/ledger.csv"));
        assert_eq!(cfg.manifest_path(), PathBuf::from("/ws/integrity-manifest.json"));
        assert_eq!(cfg.actor, "tester");
    }
}
