//! Gatewright: chained process-compliance gates for delivery workflows.
//!
//! **Gatewright blocks progression through a multi-stage human+agent
//! workflow (research → planning → implementation → review → deployment)
//! until each stage's verification gate passes.**
//!
//! Each gate is an independent, stateless, single-invocation check over
//! repository state: documents, version-control history, CI artifacts, PR
//! metadata. A gate yields PASS or BLOCKED plus the full list of violations
//! found in one pass, so an author can fix everything at once.
//!
//! # Core model
//!
//! - **Verdict**: structured outcome of one evaluation, always recorded.
//! - **Evidence ticket**: signed proof-of-pass whose signature recomputes
//!   from `(actor, timestamp, content hash)`; mutating the referenced
//!   evidence makes re-verification fail.
//! - **Ledger**: append-only audit trail, one row per ticket.
//! - **Chain**: gates unlock strictly in declared order; a regression in a
//!   previously-passed gate revokes everything downstream on the next poll
//!   cycle.
//!
//! # Exit codes
//!
//! - `0`: PASSED
//! - `1`: BLOCKED
//! - `2`: usage error (malformed task id, unknown gate)
//! - `3`: integrity failure (protected verification files were tampered
//!   with; the whole chain halts)
//!
//! # Examples
//!
//! ```bash
//! # Evaluate one gate
//! gatewright gate run research --task ENTRY-042
//!
//! # One chain cycle, JSON verdicts
//! gatewright chain run --task ENTRY-042 --format json
//!
//! # Watch the chain, re-announcing state every 5s
//! gatewright chain watch --task ENTRY-042
//!
//! # Re-verify a ticket after the fact
//! gatewright ticket verify --gate research --task ENTRY-042
//! ```
//!
//! # Crate structure
//!
//! - [`core`]: evaluation mechanism (locator, validators, probes, evidence,
//!   chain supervision)
//! - [`gates`]: gate definitions and the special per-gate algorithms

pub mod core;
pub mod gates;

mod cli;

use crate::cli::{
    ChainCommand, Cli, Command, ConfigCommand, GateCommand, IntegrityCommand, LedgerCommand,
    TicketCommand,
};
use crate::core::chain::{ChainRunner, CycleReport, Standing};
use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::evidence::{EvidenceStore, Verdict};
use crate::core::gate::{EvalArgs, Evaluator, GateSpec};
use crate::core::{integrity, task::TaskId};
use clap::Parser;
use colored::Colorize;

/// Parse arguments, dispatch, and return the process exit code.
pub fn run() -> Result<i32, GatewrightError> {
    let cli = Cli::parse();
    let config = WorkspaceConfig::from_env()?;

    match cli.command {
        Command::Gate(gate_cli) => match gate_cli.command {
            GateCommand::Run {
                gate_id,
                task,
                format,
                pr,
                base,
            } => run_gate(&config, &gate_id, &task, &format, pr, base),
            GateCommand::List { format } => list_gates(&config, &format),
        },
        Command::Chain(chain_cli) => match chain_cli.command {
            ChainCommand::Run {
                task,
                pr,
                base,
                format,
            } => run_chain_once(&config, &task, pr, base, &format),
            ChainCommand::Watch {
                task,
                pr,
                base,
                interval,
            } => watch_chain(&config, &task, pr, base, interval),
        },
        Command::Ticket(ticket_cli) => match ticket_cli.command {
            TicketCommand::Verify { gate, task } => verify_ticket(&config, &gate, &task),
        },
        Command::Ledger(ledger_cli) => match ledger_cli.command {
            LedgerCommand::Show => show_ledger(&config),
            LedgerCommand::Verify => verify_ledger(&config),
        },
        Command::Integrity(integrity_cli) => match integrity_cli.command {
            IntegrityCommand::Freeze { paths } => freeze_integrity(&config, &paths),
            IntegrityCommand::Verify => {
                integrity::verify(&config)?;
                println!("{} integrity verified, no tampering detected", "✓".bright_green());
                Ok(0)
            }
        },
        Command::Config(config_cli) => match config_cli.command {
            ConfigCommand::Show => show_config(&config),
        },
    }
}

fn run_gate(
    config: &WorkspaceConfig,
    gate_id: &str,
    raw_task: &str,
    format: &str,
    pr: Option<u64>,
    base: Option<String>,
) -> Result<i32, GatewrightError> {
    let task = TaskId::parse(raw_task)?;
    let chain = gates::load_chain(config)?;
    let spec = gates::find_gate(&chain, gate_id).ok_or_else(|| {
        GatewrightError::UsageError(format!(
            "unknown gate '{}' (declared: {})",
            gate_id,
            chain.iter().map(|g| g.id.as_str()).collect::<Vec<_>>().join(", ")
        ))
    })?;

    let evaluator = Evaluator::new(config);
    let args = EvalArgs { pr, base_ref: base };
    let (verdict, _ticket) = evaluator.evaluate_and_record(spec, &task, &args)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print_verdict(spec, &verdict);
    }
    Ok(if verdict.passed() { 0 } else { 1 })
}

fn print_verdict(spec: &GateSpec, verdict: &Verdict) {
    println!(
        "\n{} Gate {}: {} for {}",
        "▸".bright_cyan(),
        spec.id.bright_white(),
        spec.title,
        verdict.task.bright_white()
    );
    for warning in &verdict.warnings {
        println!("   {} {}", "⚠".bright_yellow(), warning);
    }
    for (key, value) in &verdict.metrics {
        println!("   {} = {}", key.bright_blue(), value);
    }
    if verdict.passed() {
        println!(
            "\n{} Gate {} PASSED for {}",
            "✅".bright_green(),
            spec.id,
            verdict.task
        );
    } else {
        println!(
            "\n{} Gate {} BLOCKED: {} violation(s):",
            "❌".bright_red(),
            spec.id,
            verdict.violations.len()
        );
        for violation in &verdict.violations {
            println!("   {} {}", "→".bright_red(), violation.message);
            if let Some(evidence) = &violation.evidence {
                println!("     evidence: {}", core::output::compact_line(evidence, 200));
            }
        }
    }
}

fn list_gates(config: &WorkspaceConfig, format: &str) -> Result<i32, GatewrightError> {
    let chain = gates::load_chain(config)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(0);
    }
    println!("Declared chain ({} gates, unlock order):", chain.len());
    for (index, spec) in chain.iter().enumerate() {
        println!(
            "  {}. {} - {} ({} check(s))",
            index,
            spec.id.bright_white(),
            spec.title,
            spec.checks.len()
        );
        if let Some(artifact) = &spec.artifact {
            for candidate in &artifact.candidates {
                println!("       artifact: {}", candidate);
            }
        }
    }
    Ok(0)
}

/// Integrity preflight + one level-triggered cycle over the chain.
fn chain_cycle(
    config: &WorkspaceConfig,
    runner: &mut ChainRunner,
    chain: &[GateSpec],
    task: &TaskId,
    args: &EvalArgs,
) -> Result<Option<CycleReport>, GatewrightError> {
    // Tampered verification config halts everything, not just one gate.
    if integrity::manifest_exists(config) {
        integrity::verify(config)?;
    }
    let evaluator = Evaluator::new(config);
    let mut eval = |_index: usize, spec: &GateSpec| -> Result<bool, GatewrightError> {
        let (verdict, _ticket) = evaluator.evaluate_and_record(spec, task, args)?;
        Ok(verdict.passed())
    };
    runner.run_cycle(chain, &mut eval)
}

fn print_cycle(report: &CycleReport) {
    for (id, standing) in &report.standings {
        match standing {
            Standing::Passed => println!("{} {} PASSED", "✅".bright_green(), id),
            Standing::Blocked => println!("{} BLOCKED: {} FAILED", "🛑".bright_red(), id),
            Standing::Locked => println!(
                "{} LOCKED: {} (complete previous gates first)",
                "🔒".bright_red(),
                id
            ),
        }
    }
}

fn run_chain_once(
    config: &WorkspaceConfig,
    raw_task: &str,
    pr: Option<u64>,
    base: Option<String>,
    format: &str,
) -> Result<i32, GatewrightError> {
    let task = TaskId::parse(raw_task)?;
    let chain = gates::load_chain(config)?;
    let args = EvalArgs { pr, base_ref: base };
    let mut runner = ChainRunner::new();
    let report = chain_cycle(config, &mut runner, &chain, &task, &args)?
        .ok_or_else(|| GatewrightError::ValidationError("cycle already in progress".to_string()))?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "\n{} Verification chain for {} ({} gates)",
            "▸".bright_cyan(),
            task.as_str().bright_white(),
            chain.len()
        );
        print_cycle(&report);
    }
    Ok(if report.all_passed() { 0 } else { 1 })
}

fn watch_chain(
    config: &WorkspaceConfig,
    raw_task: &str,
    pr: Option<u64>,
    base: Option<String>,
    interval: u64,
) -> Result<i32, GatewrightError> {
    let task = TaskId::parse(raw_task)?;
    let chain = gates::load_chain(config)?;
    let args = EvalArgs { pr, base_ref: base };
    let mut runner = ChainRunner::new();

    println!(
        "{} Watching chain for {} (every {}s, final verification is server-side)",
        "▸".bright_cyan(),
        task.as_str().bright_white(),
        interval
    );
    loop {
        println!("\n--- Verification cycle ({}) ---", core::time::now_epoch_z());
        match chain_cycle(config, &mut runner, &chain, &task, &args)? {
            Some(report) => {
                print_cycle(&report);
                if report.all_passed() {
                    println!(
                        "\n{} All {} gates passed for {}",
                        "✅".bright_green(),
                        chain.len(),
                        task
                    );
                }
            }
            None => println!("{} cycle dropped (previous cycle still running)", "⚠".bright_yellow()),
        }
        std::thread::sleep(std::time::Duration::from_secs(interval.max(1)));
    }
}

fn verify_ticket(
    config: &WorkspaceConfig,
    gate: &str,
    raw_task: &str,
) -> Result<i32, GatewrightError> {
    let task = TaskId::parse(raw_task)?;
    let store = EvidenceStore::new(config);
    let verification = store.verify_ticket(gate, &task)?;

    println!(
        "Ticket {} / {} issued {} by {}",
        verification.ticket.gate.bright_white(),
        verification.ticket.task.bright_white(),
        verification.ticket.ts,
        verification.ticket.actor
    );
    if verification.signature_valid {
        println!("{} signature recomputes correctly", "✓".bright_green());
    } else {
        println!("{} signature does NOT recompute", "✗".bright_red());
    }
    match verification.evidence_intact {
        Some(true) => println!(
            "{} evidence hash matches {}",
            "✓".bright_green(),
            verification.ticket.evidence
        ),
        Some(false) => println!(
            "{} evidence was MUTATED after ticketing: {}",
            "✗".bright_red(),
            verification.ticket.evidence
        ),
        None => println!(
            "{} evidence file missing: {}",
            "✗".bright_red(),
            verification.ticket.evidence
        ),
    }
    let ok = verification.signature_valid && verification.evidence_intact == Some(true);
    Ok(if ok { 0 } else { 1 })
}

fn show_ledger(config: &WorkspaceConfig) -> Result<i32, GatewrightError> {
    let store = EvidenceStore::new(config);
    let rows = store.read_ledger()?;
    if rows.is_empty() {
        println!("ledger is empty");
        return Ok(0);
    }
    for (index, row) in rows.iter().enumerate() {
        println!(
            "{:>4}  {}  {}  {}  {}",
            index,
            row.ts,
            row.gate.bright_white(),
            row.task,
            row.evidence
        );
    }
    Ok(0)
}

fn verify_ledger(config: &WorkspaceConfig) -> Result<i32, GatewrightError> {
    let store = EvidenceStore::new(config);
    let results = store.verify_ledger()?;
    let mut bad = 0usize;
    for (row, ok) in &results {
        if *ok {
            println!("{} {} / {} intact", "✓".bright_green(), row.gate, row.task);
        } else {
            bad += 1;
            println!(
                "{} {} / {} FAILED re-verification",
                "✗".bright_red(),
                row.gate,
                row.task
            );
        }
    }
    println!(
        "{} of {} ledger row(s) verified",
        results.len() - bad,
        results.len()
    );
    Ok(if bad == 0 { 0 } else { 1 })
}

fn freeze_integrity(config: &WorkspaceConfig, paths: &[String]) -> Result<i32, GatewrightError> {
    if paths.is_empty() {
        return Err(GatewrightError::UsageError(
            "integrity freeze needs at least one path".to_string(),
        ));
    }
    let manifest = integrity::freeze(config, paths)?;
    println!(
        "{} froze {} file(s) into {}",
        "✓".bright_green(),
        manifest.scripts.len(),
        config.manifest_path().display()
    );
    Ok(0)
}

fn show_config(config: &WorkspaceConfig) -> Result<i32, GatewrightError> {
    println!("workspace_root = {}", config.workspace_root.display());
    println!("evidence_root  = {}", config.evidence_root.display());
    match &config.external_root {
        Some(root) => println!("external_root  = {}", root.display()),
        None => println!("external_root  = (unset)"),
    }
    println!("actor          = {}", config.actor);
    println!("chain_config   = {}", config.chain_config_path().display());
    Ok(0)
}
