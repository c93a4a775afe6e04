//! Chain supervision through the binary: declared-order unlocking, LOCKED
//! markers, and regression revocation across cycles.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const GATES_TOML: &str = r#"
[[gate]]
id = "draft"
title = "Draft Notes"

[gate.artifact]
candidates = ["draft-{task}.md"]

[[gate.checks]]
kind = "density"
min_words = 5

[[gate]]
id = "review"
title = "Review Notes"

[gate.artifact]
candidates = ["review-{task}.md"]

[[gate.checks]]
kind = "checklist"
section = "Sign-Off"

[[gate]]
id = "summary"
title = "Summary"

[gate.artifact]
candidates = ["summary-{task}.md"]

[[gate.checks]]
kind = "no_placeholders"
"#;

fn run_chain(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gatewright"))
        .current_dir(dir)
        .env("GATEWRIGHT_WORKSPACE_ROOT", dir)
        .env("GATEWRIGHT_EVIDENCE_ROOT", dir.join(".evidence"))
        .env("GATEWRIGHT_ACTOR", "chain-tester")
        .args(["chain", "run", "--task", "ENTRY-009"])
        .output()
        .expect("failed to execute gatewright")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn gates_unlock_strictly_in_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gates.toml"), GATES_TOML).unwrap();

    // Nothing exists: gate 0 blocks, everything after is LOCKED, not BLOCKED.
    let output = run_chain(dir.path());
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("BLOCKED: draft"));
    assert!(text.contains("LOCKED: review"));
    assert!(text.contains("LOCKED: summary"));

    // First gate satisfied: the second becomes attemptable and blocks on its
    // own merits; the third stays locked.
    fs::write(
        dir.path().join("draft-ENTRY-009.md"),
        "five words are not enough alone but these are plenty\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("review-ENTRY-009.md"),
        "## Sign-Off\n- [x] read the draft\n- [ ] confirmed the numbers\n",
    )
    .unwrap();
    let output = run_chain(dir.path());
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("draft PASSED"));
    assert!(text.contains("BLOCKED: review"));
    assert!(text.contains("LOCKED: summary"));

    // Everything satisfied: full pass, tickets for every gate in the ledger.
    fs::write(
        dir.path().join("review-ENTRY-009.md"),
        "## Sign-Off\n- [x] read the draft\n- [x] confirmed the numbers\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("summary-ENTRY-009.md"),
        "Shipped the draft and the review held up.\n",
    )
    .unwrap();
    let output = run_chain(dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("summary PASSED"));

    let ledger = fs::read_to_string(dir.path().join(".evidence/ledger.csv")).unwrap();
    let gates: Vec<&str> = ledger
        .lines()
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert!(gates.contains(&"draft"));
    assert!(gates.contains(&"review"));
    assert!(gates.contains(&"summary"));
}

#[test]
fn regression_in_an_early_gate_relocks_downstream() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gates.toml"), GATES_TOML).unwrap();
    fs::write(
        dir.path().join("draft-ENTRY-009.md"),
        "plenty of words to satisfy the draft density gate\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("review-ENTRY-009.md"),
        "## Sign-Off\n- [x] reviewed\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("summary-ENTRY-009.md"),
        "A clean summary with no markers.\n",
    )
    .unwrap();
    assert_eq!(run_chain(dir.path()).status.code(), Some(0));

    // The draft shrinks below the density floor after passing: on the next
    // level-triggered cycle it blocks again and downstream gates re-lock.
    fs::write(dir.path().join("draft-ENTRY-009.md"), "oops\n").unwrap();
    let output = run_chain(dir.path());
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("BLOCKED: draft"));
    assert!(text.contains("LOCKED: review"));
    assert!(text.contains("LOCKED: summary"));
}

#[test]
fn chain_json_report_carries_standings() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gates.toml"), GATES_TOML).unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_gatewright"))
        .current_dir(dir.path())
        .env("GATEWRIGHT_WORKSPACE_ROOT", dir.path())
        .env("GATEWRIGHT_EVIDENCE_ROOT", dir.path().join(".evidence"))
        .args(["chain", "run", "--task", "ENTRY-009", "--format", "json"])
        .output()
        .expect("failed to execute gatewright");
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["last_passed"], -1);
    assert_eq!(report["standings"][0][1], "Blocked");
    assert_eq!(report["standings"][1][1], "Locked");
}
