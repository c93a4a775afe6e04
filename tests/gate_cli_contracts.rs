//! CLI contract enforcement for the gatewright binary: exit-code
//! conventions, structured output, and integrity lockdown behavior.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gatewright"))
        .current_dir(dir)
        .env("GATEWRIGHT_WORKSPACE_ROOT", dir)
        .env("GATEWRIGHT_EVIDENCE_ROOT", dir.join(".evidence"))
        .env("GATEWRIGHT_ACTOR", "contract-tester")
        .args(args)
        .output()
        .expect("failed to execute gatewright")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn malformed_task_id_is_a_usage_error_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["gate", "run", "audit", "--task", "bogus"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Invalid task identifier"),
        "usage error must be reported before any gate logic runs"
    );
}

#[test]
fn unknown_gate_id_is_a_usage_error_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["gate", "run", "nope", "--task", "ENTRY-001"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_artifact_blocks_with_exit_1_and_checked_paths() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["gate", "run", "audit", "--task", "ENTRY-001"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("BLOCKED"));
    assert!(text.contains("not found"));
    // BLOCKED verdict report is still written for audit continuity
    assert!(
        dir.path()
            .join(".evidence/reports/audit-ENTRY-001.md")
            .exists()
    );
    // but no ticket and no ledger row
    assert!(!dir.path().join(".evidence/tickets").exists());
    assert!(!dir.path().join(".evidence/ledger.csv").exists());
}

#[test]
fn json_format_emits_a_structured_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(
        dir.path(),
        &["gate", "run", "audit", "--task", "ENTRY-001", "--format", "json"],
    );
    assert_eq!(output.status.code(), Some(1));
    let verdict: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("stdout must be valid JSON");
    assert_eq!(verdict["outcome"], "BLOCKED");
    assert_eq!(verdict["gate"], "audit");
    assert_eq!(verdict["task"], "ENTRY-001");
    assert!(verdict["violations"].as_array().unwrap().len() >= 1);
}

#[test]
fn gate_list_shows_the_declared_chain_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["gate", "list"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    let audit_pos = text.find("audit").expect("audit gate listed");
    let approval_pos = text.find("approval").expect("approval gate listed");
    assert!(audit_pos < approval_pos, "chain must print in unlock order");
}

#[test]
fn integrity_tamper_halts_with_exit_3() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gates.toml"), "[[gate]]\nid = \"only\"\ntitle = \"Only\"\n").unwrap();

    let frozen = run_in(dir.path(), &["integrity", "freeze", "gates.toml"]);
    assert_eq!(frozen.status.code(), Some(0));
    let clean = run_in(dir.path(), &["integrity", "verify"]);
    assert_eq!(clean.status.code(), Some(0));

    fs::write(dir.path().join("gates.toml"), "[[gate]]\nid = \"forged\"\ntitle = \"F\"\n").unwrap();
    let tampered = run_in(dir.path(), &["integrity", "verify"]);
    assert_eq!(
        tampered.status.code(),
        Some(3),
        "tampering is fatal and distinct from ordinary BLOCKED"
    );
}

#[test]
fn tampered_manifest_locks_the_whole_chain() {
    let dir = tempfile::tempdir().unwrap();
    let gates = "\
[[gate]]
id = \"notes\"
title = \"Notes\"

[gate.artifact]
candidates = [\"notes-{task}.md\"]

[[gate.checks]]
kind = \"density\"
min_words = 1
";
    fs::write(dir.path().join("gates.toml"), gates).unwrap();
    fs::write(dir.path().join("notes-ENTRY-001.md"), "some notes\n").unwrap();

    run_in(dir.path(), &["integrity", "freeze", "gates.toml"]);
    let ok = run_in(dir.path(), &["chain", "run", "--task", "ENTRY-001"]);
    assert_eq!(ok.status.code(), Some(0));

    // Altering a protected file halts the chain entirely on the next cycle.
    fs::write(dir.path().join("gates.toml"), gates.replace("Notes", "Forged")).unwrap();
    let halted = run_in(dir.path(), &["chain", "run", "--task", "ENTRY-001"]);
    assert_eq!(halted.status.code(), Some(3));
}

#[test]
fn config_show_prints_resolved_roots() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["config", "show"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("workspace_root"));
    assert!(text.contains("contract-tester"));
}
