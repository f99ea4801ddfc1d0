//! Stable registry keys for resolved template paths
//!
//! A key is computed from a resolved path and used both to rewrite the
//! reference constant in the AST and to register the compiled template in
//! the runtime registry. Development mode keeps keys human-readable;
//! production mode hides the filesystem layout behind a digest.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Key generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Keys are the resolved paths themselves, readable in emitted output
    #[default]
    Development,
    /// Keys are fixed-length SHA-256 hex digests of the resolved paths
    Production,
}

/// Computes registry keys from resolved template paths.
///
/// The mapping is a pure function: the same path always yields the same key
/// within one mode. No collision handling is performed.
#[derive(Debug, Clone)]
pub struct TemplateHasher {
    mode: KeyMode,
}

impl TemplateHasher {
    /// Create a hasher for the given mode
    pub fn new(mode: KeyMode) -> Self {
        Self { mode }
    }

    /// The mode this hasher operates in
    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Compute the registry key for a resolved path.
    ///
    /// Paths are normalized to forward slashes first so the same template
    /// hashes identically on every platform.
    pub fn key(&self, path: &Path) -> String {
        let normalized = normalize_slashes(path);
        match self.mode {
            KeyMode::Development => normalized,
            KeyMode::Production => hex::encode(Sha256::digest(normalized.as_bytes())),
        }
    }
}

/// Render a path with forward slashes only
pub fn normalize_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
