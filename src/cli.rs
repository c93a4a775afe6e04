//! CLI struct definitions for the Gatewright command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "gatewright",
    version = env!("CARGO_PKG_VERSION"),
    about = "Gatewright is the chained process-compliance gatekeeper for human+agent delivery workflows: ordered verification gates over repository state with tamper-evident evidence tickets and an append-only ledger."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Evaluate a single gate for a task
    #[clap(name = "gate", visible_alias = "g")]
    Gate(GateCli),

    /// Run the ordered gate chain
    #[clap(name = "chain", visible_alias = "c")]
    Chain(ChainCli),

    /// Inspect and re-verify evidence tickets
    #[clap(name = "ticket", visible_alias = "t")]
    Ticket(TicketCli),

    /// Audit-trail ledger access
    #[clap(name = "ledger", visible_alias = "l")]
    Ledger(LedgerCli),

    /// Anti-tamper manifest over protected files
    #[clap(name = "integrity")]
    Integrity(IntegrityCli),

    /// Show resolved workspace configuration
    #[clap(name = "config")]
    Config(ConfigCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct GateCli {
    #[clap(subcommand)]
    pub command: GateCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum GateCommand {
    /// Evaluate one gate and record the verdict
    Run {
        /// Gate id from the declared chain (see `gate list`)
        gate_id: String,
        /// Task identifier (ENTRY-XXX)
        #[clap(long)]
        task: String,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
        /// PR number, for gates that audit the code host
        #[clap(long)]
        pr: Option<u64>,
        /// Base ref for diff-derived file sets (defaults to origin/main)
        #[clap(long)]
        base: Option<String>,
    },
    /// List the declared chain in unlock order
    List {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct ChainCli {
    #[clap(subcommand)]
    pub command: ChainCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ChainCommand {
    /// Evaluate the chain once, front to first failure
    Run {
        /// Task identifier (ENTRY-XXX)
        #[clap(long)]
        task: String,
        /// PR number, for gates that audit the code host
        #[clap(long)]
        pr: Option<u64>,
        /// Base ref for diff-derived file sets
        #[clap(long)]
        base: Option<String>,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Poll the chain on an interval, re-announcing state each cycle
    Watch {
        /// Task identifier (ENTRY-XXX)
        #[clap(long)]
        task: String,
        /// PR number, for gates that audit the code host
        #[clap(long)]
        pr: Option<u64>,
        /// Base ref for diff-derived file sets
        #[clap(long)]
        base: Option<String>,
        /// Poll interval in seconds
        #[clap(long, default_value = "5")]
        interval: u64,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct TicketCli {
    #[clap(subcommand)]
    pub command: TicketCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TicketCommand {
    /// Recompute a ticket signature and re-hash its evidence file
    Verify {
        /// Gate id the ticket was issued for
        #[clap(long)]
        gate: String,
        /// Task identifier (ENTRY-XXX)
        #[clap(long)]
        task: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct LedgerCli {
    #[clap(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LedgerCommand {
    /// Print ledger rows in creation order
    Show,
    /// Cross-check every ledger row against its ticket and evidence
    Verify,
}

#[derive(clap::Args, Debug)]
pub(crate) struct IntegrityCli {
    #[clap(subcommand)]
    pub command: IntegrityCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum IntegrityCommand {
    /// Record content hashes for protected files
    Freeze {
        /// Workspace-relative paths to protect
        paths: Vec<String>,
    },
    /// Recompute hashes; any mismatch halts the chain
    Verify,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ConfigCli {
    #[clap(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigCommand {
    /// Print resolved roots and actor
    Show,
}
