//! Evidence store: verdict reports, evidence tickets, append-only ledger.
//!
//! Every gate evaluation appends a verdict record for audit continuity. PASS
//! verdicts additionally produce an evidence ticket whose signature is a
//! deterministic hash over `(actor, timestamp, content hash)`, making tickets
//! independently re-verifiable: mutate the referenced evidence file and the
//! recomputed hash no longer matches. The ledger is one append-only CSV row
//! per ticket, in creation order; the sequence order is the audit trail.
//!
//! Write ordering on PASS is verdict -> ticket -> ledger row, with the ticket
//! committed via temp-file + rename so a kill mid-write cannot leave a ledger
//! row pointing at a half-written ticket.

use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::task::TaskId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn ticket_signature(actor: &str, ts: &str, content_hash: &str) -> String {
    sha256_hex(format!("{}:{}:{}", actor, ts, content_hash).as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "BLOCKED")]
    Blocked,
}

/// One violation with an optional evidence pointer (a path that was checked,
/// raw tool output, a URL that failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(message: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            evidence: Some(evidence.into()),
        }
    }
}

/// Structured outcome of one gate evaluation. Created exactly once per
/// evaluation; immutable; the latest verdict for a (gate, task) pair is
/// authoritative for chain-unlocking decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub gate: String,
    pub task: String,
    pub ts: String,
    pub event_id: String,
    pub outcome: Outcome,
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// Signed proof-of-pass record referencing hashed evidence content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub gate: String,
    pub task: String,
    pub evidence: String,
    pub hash: String,
    pub ts: String,
    pub actor: String,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct TicketVerification {
    pub ticket: Ticket,
    pub signature_valid: bool,
    pub evidence_intact: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EvidenceStore {
    config: WorkspaceConfig,
}

impl EvidenceStore {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn report_path(&self, gate: &str, task: &TaskId) -> PathBuf {
        self.config
            .reports_dir()
            .join(format!("{}-{}.md", gate, task))
    }

    pub fn ticket_path(&self, gate: &str, task: &TaskId) -> PathBuf {
        self.config
            .tickets_dir()
            .join(format!("ticket-{}-{}.json", gate, task))
    }

    /// Record a verdict. BLOCKED writes the report pair only; PASS also
    /// issues a ticket over the markdown report and appends a ledger row.
    pub fn record(&self, verdict: &Verdict, task: &TaskId) -> Result<Option<Ticket>, GatewrightError> {
        let reports = self.config.reports_dir();
        fs::create_dir_all(&reports)?;

        let md_path = self.report_path(&verdict.gate, task);
        let json_path = md_path.with_extension("json");
        fs::write(&md_path, render_report(verdict))?;
        write_json_atomic(&json_path, verdict)?;

        if !verdict.passed() {
            return Ok(None);
        }

        let report_bytes = fs::read(&md_path)?;
        let hash = sha256_hex(&report_bytes);
        let evidence = format!("reports/{}-{}.md", verdict.gate, task);
        let signature = ticket_signature(&self.config.actor, &verdict.ts, &hash);
        let ticket = Ticket {
            gate: verdict.gate.clone(),
            task: task.as_str().to_string(),
            evidence,
            hash,
            ts: verdict.ts.clone(),
            actor: self.config.actor.clone(),
            signature,
        };

        fs::create_dir_all(self.config.tickets_dir())?;
        write_json_atomic(&self.ticket_path(&verdict.gate, task), &ticket)?;
        self.append_ledger_row(&ticket)?;
        Ok(Some(ticket))
    }

    fn append_ledger_row(&self, ticket: &Ticket) -> Result<(), GatewrightError> {
        let row = format!(
            "{},{},{},{},{},{}\n",
            ticket.gate, ticket.task, ticket.evidence, ticket.hash, ticket.ts, ticket.signature
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.ledger_path())?;
        file.write_all(row.as_bytes())?;
        Ok(())
    }

    pub fn load_ticket(&self, gate: &str, task: &TaskId) -> Result<Ticket, GatewrightError> {
        let path = self.ticket_path(gate, task);
        if !path.exists() {
            return Err(GatewrightError::NotFound(format!(
                "no evidence ticket for gate '{}' task {}",
                gate, task
            )));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Recompute the ticket signature and re-hash the referenced evidence
    /// file. `evidence_intact == Some(false)` means the evidence was mutated
    /// after the ticket was issued.
    pub fn verify_ticket(&self, gate: &str, task: &TaskId) -> Result<TicketVerification, GatewrightError> {
        let ticket = self.load_ticket(gate, task)?;
        let expected = ticket_signature(&ticket.actor, &ticket.ts, &ticket.hash);
        let signature_valid = expected == ticket.signature;

        let evidence_path = self.config.evidence_root.join(&ticket.evidence);
        let evidence_intact = match fs::read(&evidence_path) {
            Ok(bytes) => Some(sha256_hex(&bytes) == ticket.hash),
            Err(_) => None,
        };

        Ok(TicketVerification {
            ticket,
            signature_valid,
            evidence_intact,
        })
    }

    /// Ledger rows in creation order.
    pub fn read_ledger(&self) -> Result<Vec<Ticket>, GatewrightError> {
        let path = self.config.ledger_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(content
            .lines()
            .filter_map(|line| {
                let fields: Vec<&str> = line.trim().split(',').collect();
                if fields.len() != 6 {
                    return None;
                }
                Some(Ticket {
                    gate: fields[0].to_string(),
                    task: fields[1].to_string(),
                    evidence: fields[2].to_string(),
                    hash: fields[3].to_string(),
                    ts: fields[4].to_string(),
                    actor: String::new(),
                    signature: fields[5].to_string(),
                })
            })
            .collect())
    }

    /// Cross-check every ledger row against its ticket file: signature must
    /// recompute and the evidence hash must still match.
    pub fn verify_ledger(&self) -> Result<Vec<(Ticket, bool)>, GatewrightError> {
        let mut results = Vec::new();
        for row in self.read_ledger()? {
            let task = TaskId::parse(&row.task)?;
            let ok = match self.verify_ticket(&row.gate, &task) {
                Ok(v) => {
                    v.signature_valid
                        && v.evidence_intact == Some(true)
                        && v.ticket.hash == row.hash
                        && v.ticket.signature == row.signature
                }
                Err(_) => false,
            };
            results.push((row, ok));
        }
        Ok(results)
    }

    /// Latest verdict for a (gate, task) pair, from the structured report.
    pub fn latest_verdict(&self, gate: &str, task: &TaskId) -> Result<Option<Verdict>, GatewrightError> {
        let path = self.report_path(gate, task).with_extension("json");
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), GatewrightError> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Human-readable verdict report in the house style.
fn render_report(verdict: &Verdict) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Gate {} Report - {}\n\n",
        verdict.gate, verdict.task
    ));
    out.push_str(&format!(
        "**Status:** {}\n**Timestamp:** {}\n**Event:** {}\n\n",
        match verdict.outcome {
            Outcome::Pass => "PASSED",
            Outcome::Blocked => "BLOCKED",
        },
        verdict.ts,
        verdict.event_id
    ));
    if !verdict.metrics.is_empty() {
        out.push_str("## Metrics\n\n| Metric | Value |\n|--------|-------|\n");
        for (key, value) in &verdict.metrics {
            out.push_str(&format!("| {} | {} |\n", key, value));
        }
        out.push('\n');
    }
    out.push_str("## Violations\n\n");
    if verdict.violations.is_empty() {
        out.push_str("None\n");
    } else {
        for violation in &verdict.violations {
            out.push_str(&format!("- {}\n", violation.message));
            if let Some(evidence) = &violation.evidence {
                out.push_str(&format!("  - evidence: {}\n", evidence));
            }
        }
    }
    if !verdict.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for warning in &verdict.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::{new_event_id, now_epoch_z};

    fn store() -> (tempfile::TempDir, EvidenceStore, TaskId) {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::explicit(dir.path(), &dir.path().join(".evidence"), "tester");
        let store = EvidenceStore::new(&config);
        let task = TaskId::parse("ENTRY-001").unwrap();
        (dir, store, task)
    }

    fn verdict(outcome: Outcome) -> Verdict {
        Verdict {
            gate: "research".to_string(),
            task: "ENTRY-001".to_string(),
            ts: now_epoch_z(),
            event_id: new_event_id(),
            outcome,
            violations: if outcome == Outcome::Blocked {
                vec![Violation::new("only 1 source cited (need 5+)")]
            } else {
                Vec::new()
            },
            warnings: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn test_pass_issues_ticket_and_ledger_row() {
        let (_dir, store, task) = store();
        let ticket = store.record(&verdict(Outcome::Pass), &task).unwrap();
        let ticket = ticket.expect("pass must produce a ticket");
        assert_eq!(
            ticket.signature,
            ticket_signature("tester", &ticket.ts, &ticket.hash)
        );
        let rows = store.read_ledger().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gate, "research");
        assert_eq!(rows[0].signature, ticket.signature);
    }

    #[test]
    fn test_blocked_writes_report_but_no_ticket() {
        let (_dir, store, task) = store();
        let ticket = store.record(&verdict(Outcome::Blocked), &task).unwrap();
        assert!(ticket.is_none());
        assert!(store.report_path("research", &task).exists());
        assert!(!store.ticket_path("research", &task).exists());
        assert!(store.read_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_ticket_verifies_and_detects_tamper() {
        let (_dir, store, task) = store();
        store.record(&verdict(Outcome::Pass), &task).unwrap();

        let verification = store.verify_ticket("research", &task).unwrap();
        assert!(verification.signature_valid);
        assert_eq!(verification.evidence_intact, Some(true));

        // Mutate the referenced evidence after ticket creation.
        let report = store.report_path("research", &task);
        fs::write(&report, "forged").unwrap();
        let verification = store.verify_ticket("research", &task).unwrap();
        assert!(verification.signature_valid);
        assert_eq!(verification.evidence_intact, Some(false));
    }

    #[test]
    fn test_ledger_is_append_only_in_creation_order() {
        let (_dir, store, task) = store();
        store.record(&verdict(Outcome::Pass), &task).unwrap();
        let mut second = verdict(Outcome::Pass);
        second.gate = "scope".to_string();
        store.record(&second, &task).unwrap();

        let rows = store.read_ledger().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gate, "research");
        assert_eq!(rows[1].gate, "scope");
    }

    #[test]
    fn test_verify_ledger_flags_mutated_evidence() {
        let (_dir, store, task) = store();
        store.record(&verdict(Outcome::Pass), &task).unwrap();
        fs::write(store.report_path("research", &task), "forged").unwrap();
        let results = store.verify_ledger().unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].1);
    }

    #[test]
    fn test_latest_verdict_round_trip() {
        let (_dir, store, task) = store();
        store.record(&verdict(Outcome::Blocked), &task).unwrap();
        let loaded = store.latest_verdict("research", &task).unwrap().unwrap();
        assert_eq!(loaded.outcome, Outcome::Blocked);
        assert_eq!(loaded.violations.len(), 1);
        assert!(store.latest_verdict("scope", &task).unwrap().is_none());
    }
}
