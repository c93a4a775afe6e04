//! Anti-tamper manifest over protected files.
//!
//! A recorded manifest maps protected file paths to content hashes. A hash
//! mismatch on verify is fatal and halts the entire chain, distinct from an
//! ordinary BLOCKED: it implies the verification logic itself may have been
//! altered.

use crate::core::config::WorkspaceConfig;
use crate::core::error::GatewrightError;
use crate::core::evidence::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub scripts: BTreeMap<String, String>,
}

/// Record content hashes for the given workspace-relative paths.
pub fn freeze(config: &WorkspaceConfig, paths: &[String]) -> Result<IntegrityManifest, GatewrightError> {
    let mut manifest = IntegrityManifest::default();
    for relative in paths {
        let full = config.workspace_root.join(relative);
        let bytes = fs::read(&full).map_err(|_| {
            GatewrightError::NotFound(format!("cannot freeze missing file: {}", relative))
        })?;
        manifest
            .scripts
            .insert(relative.clone(), sha256_hex(&bytes));
    }
    let body = serde_json::to_string_pretty(&manifest)?;
    fs::write(config.manifest_path(), body)?;
    Ok(manifest)
}

pub fn manifest_exists(config: &WorkspaceConfig) -> bool {
    config.manifest_path().is_file()
}

/// Recompute every recorded hash. Any mismatch or missing protected file is
/// an integrity failure (exit code 3).
pub fn verify(config: &WorkspaceConfig) -> Result<(), GatewrightError> {
    let path = config.manifest_path();
    let content = fs::read_to_string(&path).map_err(|_| {
        GatewrightError::IntegrityError("integrity manifest missing".to_string())
    })?;
    let manifest: IntegrityManifest = serde_json::from_str(&content)
        .map_err(|e| GatewrightError::IntegrityError(format!("manifest unreadable: {}", e)))?;

    let mut tampered = Vec::new();
    for (relative, expected) in &manifest.scripts {
        let full = config.workspace_root.join(relative);
        match fs::read(&full) {
            Ok(bytes) => {
                let found = sha256_hex(&bytes);
                if &found != expected {
                    tampered.push(format!("{} (expected {}, found {})", relative, expected, found));
                }
            }
            Err(_) => tampered.push(format!("{} (missing)", relative)),
        }
    }

    if tampered.is_empty() {
        Ok(())
    } else {
        Err(GatewrightError::IntegrityError(format!(
            "tampering detected: {}",
            tampered.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, WorkspaceConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::explicit(dir.path(), &dir.path().join(".evidence"), "t");
        (dir, config)
    }

    #[test]
    fn test_freeze_then_verify_clean() {
        let (dir, config) = workspace();
        fs::write(dir.path().join("gates.toml"), "[[gate]]\nid = 'x'\n").unwrap();
        freeze(&config, &["gates.toml".to_string()]).unwrap();
        assert!(verify(&config).is_ok());
    }

    #[test]
    fn test_tamper_is_fatal_exit_code() {
        let (dir, config) = workspace();
        fs::write(dir.path().join("gates.toml"), "original").unwrap();
        freeze(&config, &["gates.toml".to_string()]).unwrap();
        fs::write(dir.path().join("gates.toml"), "altered").unwrap();
        let err = verify(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_missing_manifest_is_integrity_failure() {
        let (_dir, config) = workspace();
        let err = verify(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_missing_protected_file_is_tamper() {
        let (dir, config) = workspace();
        fs::write(dir.path().join("gates.toml"), "x").unwrap();
        freeze(&config, &["gates.toml".to_string()]).unwrap();
        fs::remove_file(dir.path().join("gates.toml")).unwrap();
        assert!(verify(&config).is_err());
    }
}
