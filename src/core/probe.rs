//! External probe adapters.
//!
//! Every call out of the process — version control, the PR host, network
//! reachability, analysis tools — goes through this module and comes back as
//! a normalized [`ProbeOutcome`]. The adapters distinguish "tool ran and
//! reported problems" (a violation for the gate to record) from "tool could
//! not run" (an environment warning, unless the call itself is the check).
//!
//! One bounded timeout applies to every external call; a timeout maps to a
//! failed probe result and aborts only that probe, never the evaluation.

use crate::core::error::GatewrightError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized result of one external call.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    pub exit_code: i32,
    pub metrics: BTreeMap<String, serde_json::Value>,
    pub raw_output: String,
}

/// Three-way probe status. `Unavailable` means the tool could not be invoked
/// at all (not installed, not a repo); callers decide whether that degrades
/// to a warning or blocks.
#[derive(Debug, Clone)]
pub enum ProbeStatus {
    Ran(ProbeOutcome),
    Unavailable(String),
}

impl ProbeStatus {
    pub fn ran_ok(&self) -> bool {
        matches!(self, ProbeStatus::Ran(o) if o.success)
    }
}

/// Run one external tool with the uniform timeout policy.
///
/// Stdout/stderr are drained on reader threads so a chatty child cannot
/// deadlock on a full pipe. On timeout the child is killed and a failed
/// outcome is returned with a `timed_out` metric.
pub fn run_tool(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> ProbeStatus {
    let spawned = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ProbeStatus::Unavailable(format!("'{}' is not installed", program));
        }
        Err(e) => {
            return ProbeStatus::Unavailable(format!("'{}' could not be invoked: {}", program, e));
        }
    };

    let stdout_reader = child.stdout.take().map(drain_pipe);
    let stderr_reader = child.stderr.take().map(drain_pipe);

    let deadline = Instant::now() + timeout;
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    timed_out = true;
                    break None;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => break None,
        }
    };

    let stdout = stdout_reader.map(join_pipe).unwrap_or_default();
    let stderr = stderr_reader.map(join_pipe).unwrap_or_default();

    let exit_code = status.and_then(|s| s.code()).unwrap_or(-1);
    let mut metrics = BTreeMap::new();
    metrics.insert("exit_code".to_string(), serde_json::json!(exit_code));
    if timed_out {
        metrics.insert("timed_out".to_string(), serde_json::json!(true));
    }

    ProbeStatus::Ran(ProbeOutcome {
        success: !timed_out && exit_code == 0,
        exit_code,
        metrics,
        raw_output: format!("{}{}", stdout, stderr),
    })
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn join_pipe(handle: std::thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

// ===== Version control =====

/// Stable command contract over the underlying version-control system.
#[derive(Debug, Clone)]
pub struct GitProbe {
    root: PathBuf,
}

impl GitProbe {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Current revision id, or None when git is unavailable / not a repo.
    pub fn current_revision(&self) -> Option<String> {
        match run_tool("git", &["rev-parse", "HEAD"], &self.root, PROBE_TIMEOUT) {
            ProbeStatus::Ran(o) if o.success => {
                let rev = o.raw_output.trim().to_string();
                if rev.is_empty() { None } else { Some(rev) }
            }
            _ => None,
        }
    }

    /// Changed paths between a base ref and HEAD. Tries the declared base
    /// first, then the usual fallbacks, mirroring how plans are diffed on
    /// branches that lack an origin remote.
    pub fn changed_paths(&self, base: Option<&str>) -> Option<Vec<String>> {
        let mut ranges: Vec<String> = Vec::new();
        if let Some(b) = base {
            ranges.push(format!("{}..HEAD", b));
        }
        ranges.push("origin/main..HEAD".to_string());
        ranges.push("main..HEAD".to_string());
        ranges.push("HEAD~3..HEAD".to_string());

        let mut any_succeeded = false;
        for range in &ranges {
            let status = run_tool(
                "git",
                &["diff", "--name-only", range],
                &self.root,
                PROBE_TIMEOUT,
            );
            if let ProbeStatus::Ran(o) = status {
                if o.success {
                    any_succeeded = true;
                    let paths: Vec<String> = o
                        .raw_output
                        .lines()
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                        .collect();
                    if !paths.is_empty() {
                        return Some(paths);
                    }
                }
            }
        }
        // A range that resolved but diffed empty is a real (empty) file set;
        // only total failure means the diff could not be determined.
        if any_succeeded { Some(Vec::new()) } else { None }
    }

    /// Commit ids + subjects whose message matches a query.
    pub fn commits_matching(&self, query: &str) -> Vec<(String, String)> {
        let grep = format!("--grep={}", query);
        let status = run_tool(
            "git",
            &["log", "--all", &grep, "--format=%H %s"],
            &self.root,
            PROBE_TIMEOUT,
        );
        match status {
            ProbeStatus::Ran(o) if o.success => o
                .raw_output
                .lines()
                .filter_map(|l| {
                    let mut parts = l.trim().splitn(2, ' ');
                    let id = parts.next()?.to_string();
                    let message = parts.next().unwrap_or("").to_string();
                    if id.is_empty() { None } else { Some((id, message)) }
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ===== Code-host PR API =====

#[derive(Debug, Clone)]
pub struct PrComment {
    pub author: String,
    pub body: String,
}

/// PR body/comment access via the `gh` CLI. Unavailability here is a
/// blocking violation for the gates that use it: fetching the PR *is* the
/// check.
#[derive(Debug, Clone)]
pub struct PrProbe {
    root: PathBuf,
}

impl PrProbe {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn body(&self, pr: u64) -> Result<String, String> {
        let pr_arg = pr.to_string();
        let status = run_tool(
            "gh",
            &["pr", "view", &pr_arg, "--json", "body"],
            &self.root,
            PROBE_TIMEOUT,
        );
        let outcome = match status {
            ProbeStatus::Ran(o) if o.success => o,
            ProbeStatus::Ran(o) => {
                return Err(format!(
                    "could not fetch PR #{}: {}",
                    pr,
                    crate::core::output::compact_line(&o.raw_output, 160)
                ));
            }
            ProbeStatus::Unavailable(why) => return Err(why),
        };
        let value: serde_json::Value =
            serde_json::from_str(outcome.raw_output.trim()).map_err(|e| e.to_string())?;
        Ok(value
            .get("body")
            .and_then(|b| b.as_str())
            .unwrap_or("")
            .to_string())
    }

    pub fn comments(&self, pr: u64) -> Result<Vec<PrComment>, String> {
        let pr_arg = pr.to_string();
        let status = run_tool(
            "gh",
            &["pr", "view", &pr_arg, "--json", "comments"],
            &self.root,
            PROBE_TIMEOUT,
        );
        let outcome = match status {
            ProbeStatus::Ran(o) if o.success => o,
            ProbeStatus::Ran(o) => {
                return Err(format!(
                    "could not fetch PR #{} comments: {}",
                    pr,
                    crate::core::output::compact_line(&o.raw_output, 160)
                ));
            }
            ProbeStatus::Unavailable(why) => return Err(why),
        };
        let value: serde_json::Value =
            serde_json::from_str(outcome.raw_output.trim()).map_err(|e| e.to_string())?;
        let comments = value
            .get("comments")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(comments
            .iter()
            .map(|c| PrComment {
                author: c
                    .pointer("/author/login")
                    .and_then(|a| a.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                body: c
                    .get("body")
                    .and_then(|b| b.as_str())
                    .unwrap_or("")
                    .to_string(),
            })
            .collect())
    }
}

// ===== Network reachability =====

/// HEAD request with bounded timeout. Returns the status code, or an error
/// string on timeout/connection failure. Unavailability of the network is a
/// violation for reachability checks: the call is the check.
pub fn head_request(url: &str, timeout: Duration) -> Result<u16, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.head(url).send().map_err(|e| e.to_string())?;
    Ok(response.status().as_u16())
}

/// Run a declared tool and parse a numeric field out of its JSON stdout via
/// a JSON pointer (e.g. `/categories/performance/score`).
pub fn run_scored_tool(
    command: &[String],
    score_pointer: &str,
    cwd: &Path,
) -> Result<ProbeStatus, GatewrightError> {
    if command.is_empty() {
        return Err(GatewrightError::ValidationError(
            "scored tool command is empty".to_string(),
        ));
    }
    let args: Vec<&str> = command[1..].iter().map(|s| s.as_str()).collect();
    let status = run_tool(&command[0], &args, cwd, PROBE_TIMEOUT);
    if let ProbeStatus::Ran(mut outcome) = status {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(outcome.raw_output.trim()) {
            if let Some(score) = value.pointer(score_pointer).and_then(|s| s.as_f64()) {
                outcome
                    .metrics
                    .insert("score".to_string(), serde_json::json!(score));
            }
        }
        return Ok(ProbeStatus::Ran(outcome));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_tool_missing_binary_is_unavailable() {
        let status = run_tool(
            "definitely-not-a-real-tool-9f3a",
            &[],
            Path::new("."),
            Duration::from_secs(1),
        );
        assert!(matches!(status, ProbeStatus::Unavailable(_)));
    }

    #[test]
    fn test_run_tool_captures_output_and_exit() {
        let status = run_tool("sh", &["-c", "echo hi; exit 3"], Path::new("."), PROBE_TIMEOUT);
        match status {
            ProbeStatus::Ran(o) => {
                assert!(!o.success);
                assert_eq!(o.exit_code, 3);
                assert!(o.raw_output.contains("hi"));
            }
            ProbeStatus::Unavailable(_) => panic!("sh should exist"),
        }
    }

    #[test]
    fn test_run_tool_timeout_maps_to_failed_probe() {
        let status = run_tool(
            "sh",
            &["-c", "sleep 5"],
            Path::new("."),
            Duration::from_millis(100),
        );
        match status {
            ProbeStatus::Ran(o) => {
                assert!(!o.success);
                assert_eq!(o.metrics.get("timed_out"), Some(&serde_json::json!(true)));
            }
            ProbeStatus::Unavailable(_) => panic!("sh should exist"),
        }
    }
}
