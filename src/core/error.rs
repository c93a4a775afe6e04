use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewrightError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Usage error: {0}")]
    UsageError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Integrity failure: {0}")]
    IntegrityError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl GatewrightError {
    /// Exit code convention: 2 for usage errors, 3 for integrity failures
    /// (halts the whole chain), 1 for everything else. PASS/BLOCKED exit
    /// codes are decided by the caller from the verdict, not from errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewrightError::UsageError(_) => 2,
            GatewrightError::IntegrityError(_) => 3,
            _ => 1,
        }
    }
}
