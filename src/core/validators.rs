//! Content validator library.
//!
//! Every document check is a named, independently testable predicate behind
//! the [`Validator`] trait instead of inline pattern matching scattered per
//! gate. Gates compose validators by conjunction, and every violation found
//! in one pass is collected and reported together so an author can fix
//! everything at once.

use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::probe;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A located artifact loaded for validation. Read-only to the gate.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, GatewrightError> {
        let text = fs::read_to_string(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            path: PathBuf::from("<inline>"),
            text: text.to_string(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn nonblank_line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }

    /// Body of the first level-2/3 section whose heading matches `pattern`,
    /// up to the next heading of the same depth.
    pub fn section_body(&self, pattern: &Regex) -> Option<String> {
        let mut body = String::new();
        let mut in_section = false;
        for line in self.text.lines() {
            let is_heading = line.starts_with("##");
            if is_heading {
                if in_section {
                    break;
                }
                if pattern.is_match(line) {
                    in_section = true;
                    continue;
                }
            }
            if in_section {
                body.push_str(line);
                body.push('\n');
            }
        }
        if in_section { Some(body) } else { None }
    }

    /// Embedded URLs, with known placeholder/loopback hosts filtered out.
    pub fn external_urls(&self) -> Vec<String> {
        let url_re = match Regex::new(r#"https?://[^\s)\]"',]+"#) {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };
        url_re
            .find_iter(&self.text)
            .map(|m| m.as_str().to_string())
            .filter(|u| {
                !u.contains("localhost")
                    && !u.contains("127.0.0.1")
                    && !u.contains("example.com")
                    && !u.contains("placeholder")
                    && !u.contains("your-domain")
            })
            .collect()
    }
}

/// Outcome of one validator. `Warn` surfaces degraded-mode conditions that
/// must not block but must not be silent either.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Pass { detail: String },
    Fail { detail: String },
    Warn { detail: String },
}

impl CheckResult {
    pub fn pass(detail: impl Into<String>) -> Self {
        CheckResult::Pass {
            detail: detail.into(),
        }
    }
    pub fn fail(detail: impl Into<String>) -> Self {
        CheckResult::Fail {
            detail: detail.into(),
        }
    }
    pub fn warn(detail: impl Into<String>) -> Self {
        CheckResult::Warn {
            detail: detail.into(),
        }
    }

    pub fn passed(&self) -> bool {
        !matches!(self, CheckResult::Fail { .. })
    }
}

/// Shared evaluation context. `head` is the current version-control revision,
/// resolved once per gate evaluation.
pub struct CheckContext<'a> {
    pub config: &'a WorkspaceConfig,
    pub head: Option<String>,
    pub http_timeout: Duration,
}

pub trait Validator {
    fn label(&self) -> String;
    fn check(&self, doc: &Document, cx: &CheckContext) -> CheckResult;
}

fn ci_regex(pattern: &str) -> Result<Regex, CheckResult> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|_| CheckResult::fail(format!("invalid check pattern '{}'", pattern)))
}

// ===== Section presence =====

/// Heading must match one of a declared set of acceptable synonyms.
pub struct SectionPresence {
    pub any_of: Vec<String>,
}

impl Validator for SectionPresence {
    fn label(&self) -> String {
        format!("section ({})", self.any_of.join(" | "))
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        for synonym in &self.any_of {
            let pattern = format!(r"(?m)^#{{1,3}}\s*.*{}", synonym);
            match ci_regex(&pattern) {
                Ok(re) => {
                    if re.is_match(&doc.text) {
                        return CheckResult::pass(format!("section '{}' present", synonym));
                    }
                }
                Err(fail) => return fail,
            }
        }
        CheckResult::fail(format!(
            "missing required section (any of: {})",
            self.any_of.join(", ")
        ))
    }
}

// ===== Freshness anchor =====

/// Document must contain the current revision id (full or abbreviated),
/// proving it was written against the present state. Non-waivable.
pub struct FreshnessAnchor;

impl Validator for FreshnessAnchor {
    fn label(&self) -> String {
        "freshness anchor".to_string()
    }

    fn check(&self, doc: &Document, cx: &CheckContext) -> CheckResult {
        let head = match &cx.head {
            Some(h) => h,
            None => {
                return CheckResult::warn(
                    "could not resolve current revision (version control unavailable)".to_string(),
                );
            }
        };
        let short: String = head.chars().take(7).collect();
        if doc.text.contains(head) || doc.text.contains(&short) {
            CheckResult::pass(format!("anchored to revision {}", short))
        } else {
            CheckResult::fail(format!(
                "document is not anchored to current revision {} (add the output of the current-revision command)",
                short
            ))
        }
    }
}

// ===== Minimum density =====

/// Non-blank line count / word count at or above declared thresholds. A weak
/// proxy for "this is not a one-line stub".
pub struct MinimumDensity {
    pub min_words: usize,
    pub min_lines: usize,
}

impl Validator for MinimumDensity {
    fn label(&self) -> String {
        format!("density (>= {} words, >= {} lines)", self.min_words, self.min_lines)
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let words = doc.word_count();
        let lines = doc.nonblank_line_count();
        if words < self.min_words {
            return CheckResult::fail(format!(
                "only {} words (need {}+)",
                words, self.min_words
            ));
        }
        if lines < self.min_lines {
            return CheckResult::fail(format!(
                "only {} non-blank lines (need {}+)",
                lines, self.min_lines
            ));
        }
        CheckResult::pass(format!("{} words, {} non-blank lines", words, lines))
    }
}

// ===== Placeholder absence =====

/// Text must not contain any declared template-placeholder marker.
pub struct PlaceholderAbsence {
    pub markers: Vec<String>,
}

impl PlaceholderAbsence {
    pub fn default_markers() -> Vec<String> {
        ["TODO", "TBD", "FIXME", "XXX", "PLACEHOLDER", "lorem ipsum"]
            .iter()
            .map(|m| m.to_string())
            .collect()
    }
}

impl Validator for PlaceholderAbsence {
    fn label(&self) -> String {
        "placeholder absence".to_string()
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let lower = doc.text.to_lowercase();
        let mut hits = Vec::new();
        let mut total = 0usize;
        for marker in &self.markers {
            let count = lower.matches(&marker.to_lowercase()).count();
            if count > 0 {
                total += count;
                hits.push(marker.clone());
            }
        }
        if total > 0 {
            CheckResult::fail(format!(
                "{} placeholder marker(s) found ({})",
                total,
                hits.join(", ")
            ))
        } else {
            CheckResult::pass("no placeholder markers".to_string())
        }
    }
}

// ===== Checklist completion =====

/// Checked vs unchecked markdown checklist markers inside a named section.
/// Fails when any unchecked item remains or when the section is absent.
pub struct ChecklistComplete {
    pub section: String,
}

impl Validator for ChecklistComplete {
    fn label(&self) -> String {
        format!("checklist complete ({})", self.section)
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let heading = match ci_regex(&self.section) {
            Ok(re) => re,
            Err(fail) => return fail,
        };
        let body = match doc.section_body(&heading) {
            Some(b) => b,
            None => {
                return CheckResult::fail(format!(
                    "checklist section '{}' is absent",
                    self.section
                ));
            }
        };
        let checked = body.to_lowercase().matches("- [x]").count();
        let unchecked = body.matches("- [ ]").count();
        if unchecked > 0 {
            CheckResult::fail(format!(
                "{} unchecked item(s) remain in '{}' ({} checked)",
                unchecked, self.section, checked
            ))
        } else if checked == 0 {
            CheckResult::fail(format!(
                "checklist section '{}' contains no items",
                self.section
            ))
        } else {
            CheckResult::pass(format!("{} item(s) signed off", checked))
        }
    }
}

// ===== Numeric evidence =====

/// A declared claim must co-occur with an actual number, not prose alone.
pub struct NumericEvidence {
    pub claim: String,
}

impl Validator for NumericEvidence {
    fn label(&self) -> String {
        format!("numeric evidence ({})", self.claim)
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let claim_re = match ci_regex(&self.claim) {
            Ok(re) => re,
            Err(fail) => return fail,
        };
        let digit_re = match Regex::new(r"\d") {
            Ok(re) => re,
            Err(_) => return CheckResult::fail("internal digit pattern invalid".to_string()),
        };
        let mut claim_lines = 0usize;
        for line in doc.text.lines() {
            if claim_re.is_match(line) {
                claim_lines += 1;
                if digit_re.is_match(line) {
                    return CheckResult::pass(format!("'{}' backed by a number", self.claim));
                }
            }
        }
        if claim_lines == 0 {
            CheckResult::fail(format!("no '{}' statement found", self.claim))
        } else {
            CheckResult::fail(format!(
                "'{}' mentioned {} time(s) but never with an actual number",
                self.claim, claim_lines
            ))
        }
    }
}

// ===== Referenced file existence + non-triviality =====

/// A file path extracted from the text must exist on disk and exceed a
/// minimum byte size. Guards against blank/placeholder binary evidence.
pub struct ReferencedFileExists {
    pub pattern: String,
    pub min_bytes: u64,
}

impl Validator for ReferencedFileExists {
    fn label(&self) -> String {
        format!("referenced file ({})", self.pattern)
    }

    fn check(&self, doc: &Document, cx: &CheckContext) -> CheckResult {
        let re = match ci_regex(&self.pattern) {
            Ok(re) => re,
            Err(fail) => return fail,
        };
        let reference = match re.find(&doc.text) {
            Some(m) => m.as_str().trim_matches('`').to_string(),
            None => {
                return CheckResult::fail(format!(
                    "no file reference matching '{}' found",
                    self.pattern
                ));
            }
        };
        let full = cx.config.workspace_root.join(&reference);
        match fs::metadata(&full) {
            Ok(meta) if meta.len() >= self.min_bytes => {
                CheckResult::pass(format!("{} ({} bytes)", reference, meta.len()))
            }
            Ok(meta) => CheckResult::fail(format!(
                "{} is only {} bytes (need {}+) - likely a blank placeholder",
                reference,
                meta.len(),
                self.min_bytes
            )),
            Err(_) => CheckResult::fail(format!("referenced file does not exist: {}", reference)),
        }
    }
}

// ===== External reachability =====

/// A URL extracted from the text must respond with a success-range status
/// within the bounded timeout. Unavailability of the network is a violation
/// here: the call is the check.
pub struct ExternalReachability;

impl Validator for ExternalReachability {
    fn label(&self) -> String {
        "external reachability".to_string()
    }

    fn check(&self, doc: &Document, cx: &CheckContext) -> CheckResult {
        let urls = doc.external_urls();
        let url = match urls.first() {
            Some(u) => u,
            None => {
                return CheckResult::fail(
                    "no non-placeholder URL found in document".to_string(),
                );
            }
        };
        match probe::head_request(url, cx.http_timeout) {
            Ok(status) if (200..400).contains(&status) => {
                CheckResult::pass(format!("{} returned HTTP {}", url, status))
            }
            Ok(status) => CheckResult::fail(format!("{} returned HTTP {}", url, status)),
            Err(why) => CheckResult::fail(format!("{} is unreachable: {}", url, why)),
        }
    }
}

// ===== Pattern count =====

/// A declared pattern must occur at least `min` times (documented searches,
/// cited sources, code blocks, file references).
pub struct CountAtLeast {
    pub pattern: String,
    pub min: usize,
    pub label: String,
}

impl Validator for CountAtLeast {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let re = match ci_regex(&self.pattern) {
            Ok(re) => re,
            Err(fail) => return fail,
        };
        let count = re.find_iter(&doc.text).count();
        if count < self.min {
            CheckResult::fail(format!(
                "only {} {} (need {}+)",
                count, self.label, self.min
            ))
        } else {
            CheckResult::pass(format!("{} {}", count, self.label))
        }
    }
}

// ===== Vocabulary variety =====

/// Unique-word ratio floor. Copy-paste spam and generated filler score low.
pub struct VocabularyVariety {
    pub min_ratio: f64,
}

impl Validator for VocabularyVariety {
    fn label(&self) -> String {
        "vocabulary variety".to_string()
    }

    fn check(&self, doc: &Document, _cx: &CheckContext) -> CheckResult {
        let words: Vec<String> = doc
            .text
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if words.is_empty() {
            return CheckResult::fail("document is empty".to_string());
        }
        let unique: std::collections::HashSet<&String> = words.iter().collect();
        let ratio = unique.len() as f64 / words.len() as f64;
        if ratio < self.min_ratio {
            CheckResult::fail(format!(
                "vocabulary variety {:.0}% below {:.0}% floor - looks like copy-paste",
                ratio * 100.0,
                self.min_ratio * 100.0
            ))
        } else {
            CheckResult::pass(format!("variety {:.0}%", ratio * 100.0))
        }
    }
}
