//! External-integration mock-coverage audit.
//!
//! For each declared third-party integration signature: detect whether the
//! integration is referenced in source, and if so whether at least one
//! associated test exists that is not fully mocked (mock-declaration count
//! below test-case count in the same file). A passing mocked test suite must
//! never substitute for proof that an external dependency is genuinely
//! reachable and configured, so present-but-fully-mocked blocks.

use crate::core::error::GatewrightError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const CODE_EXTENSIONS: [&str; 8] = ["rs", "ts", "tsx", "js", "jsx", "py", "go", "java"];
const MOCK_MARKERS: [&str; 6] = [
    "vi.mock",
    "jest.mock",
    "mockresolvedvalue",
    "mockimplementation",
    "mockito",
    "mock(",
];
const TEST_MARKERS: [&str; 5] = ["#[test]", "#[tokio::test]", "it(", "test(", "def test_"];

pub fn default_signatures() -> Vec<String> {
    [
        "stripe", "supabase", "resend", "twilio", "sendgrid", "oauth", "openai", "anthropic",
        "firebase", "s3",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationFinding {
    pub signature: String,
    pub referenced_in: Vec<String>,
    pub tested_in: Vec<String>,
    pub unmocked_tests: usize,
}

impl IntegrationFinding {
    /// Present in source but every associated test (if any) is fully mocked.
    pub fn fully_mocked(&self) -> bool {
        !self.referenced_in.is_empty() && self.unmocked_tests == 0
    }
}

fn is_test_file(path: &Path) -> bool {
    let text = path.to_string_lossy().to_lowercase();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    text.contains("/tests/")
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.ends_with("_test.rs")
        || name.starts_with("test_")
}

fn collect_code_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<(), GatewrightError> {
    if !root.is_dir() {
        return Ok(());
    }
    let name = root.file_name().and_then(|s| s.to_str()).unwrap_or("");
    if matches!(name, ".git" | "target" | "node_modules" | "dist" | ".evidence") {
        return Ok(());
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_code_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn count_occurrences(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().map(|n| haystack.matches(n).count()).sum()
}

/// Audit the workspace for every declared signature.
pub fn audit(root: &Path, signatures: &[String]) -> Result<Vec<IntegrationFinding>, GatewrightError> {
    let mut files = Vec::new();
    collect_code_files(root, &mut files)?;

    let mut loaded: Vec<(PathBuf, String, bool)> = Vec::new();
    for path in files {
        let content = match fs::read_to_string(&path) {
            Ok(c) => c.to_lowercase(),
            Err(_) => continue,
        };
        let test = is_test_file(&path);
        loaded.push((path, content, test));
    }

    let mut findings = Vec::new();
    for signature in signatures {
        let needle = signature.to_lowercase();
        let mut referenced_in = Vec::new();
        let mut tested_in = Vec::new();
        let mut unmocked_tests = 0usize;

        for (path, content, is_test) in &loaded {
            if !content.contains(&needle) {
                continue;
            }
            let display = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            if *is_test {
                let mocks = count_occurrences(content, &MOCK_MARKERS);
                let cases = count_occurrences(content, &TEST_MARKERS);
                if mocks < cases {
                    unmocked_tests += 1;
                }
                tested_in.push(display);
            } else {
                referenced_in.push(display);
            }
        }

        if !referenced_in.is_empty() {
            findings.push(IntegrationFinding {
                signature: signature.clone(),
                referenced_in,
                tested_in,
                unmocked_tests,
            });
        }
    }
    Ok(findings)
}
