//! Task identifier parsing and normalization.
//!
//! A task identifier is the join key across all artifacts, verdicts, tickets,
//! and ledger rows for one unit of work. Format: `ENTRY-` prefix plus an
//! alphanumeric discriminator. Immutable once assigned.

use crate::core::error::GatewrightError;
use regex::Regex;
use std::fmt;

const TASK_PREFIX: &str = "ENTRY-";

/// Validated task identifier, normalized to upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Parse and normalize a raw identifier. Malformed identifiers are a
    /// usage error, reported before any gate logic runs.
    pub fn parse(raw: &str) -> Result<Self, GatewrightError> {
        let pattern = Regex::new(r"(?i)^ENTRY-[A-Z0-9][A-Z0-9._-]*$")
            .map_err(|e| GatewrightError::ValidationError(e.to_string()))?;
        if !pattern.is_match(raw.trim()) {
            return Err(GatewrightError::UsageError(format!(
                "Invalid task identifier '{}' (expected ENTRY-XXX)",
                raw
            )));
        }
        Ok(TaskId(raw.trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Discriminator without the `ENTRY-` prefix.
    pub fn bare(&self) -> &str {
        &self.0[TASK_PREFIX.len()..]
    }

    /// Legacy underscore form used by older artifact layouts
    /// (e.g. `ENTRY-042-B` -> `042_B`).
    pub fn underscored(&self) -> String {
        self.bare().replace('-', "_")
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let id = TaskId::parse("entry-042").unwrap();
        assert_eq!(id.as_str(), "ENTRY-042");
        assert_eq!(id.bare(), "042");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TaskId::parse("TASK-042").is_err());
        assert!(TaskId::parse("ENTRY-").is_err());
        assert!(TaskId::parse("ENTRY 042").is_err());
        assert!(TaskId::parse("").is_err());
    }

    #[test]
    fn test_malformed_is_usage_error() {
        let err = TaskId::parse("bogus").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_underscored_legacy_form() {
        let id = TaskId::parse("ENTRY-042-B").unwrap();
        assert_eq!(id.underscored(), "042_B");
    }
}
