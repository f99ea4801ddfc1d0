//! Compile options
//!
//! Options mirror what a host build pipeline passes per template: where the
//! shared runtime environment module lives, the key mode, and whether to
//! wrap output in HTML source markers. A TOML form is provided for the CLI.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::hash::KeyMode;

/// Errors that can occur when building or loading compile options
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse options TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("environment_module_path is required")]
    MissingEnvironmentModule,
}

/// Options for one compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path to the runtime environment module the emitted code requires
    pub environment_module_path: String,
    /// Key generation mode
    pub mode: KeyMode,
    /// Wrap the template source in `<!-- START/END -->` markers
    pub html_comments: bool,
    /// Base directory used to relativize paths in HTML markers
    pub base_dir: Option<PathBuf>,
}

/// TOML structure for deserializing options
///
/// Unknown keys are rejected, so a typo in an options file fails loudly
/// instead of being silently ignored.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlOptions {
    environment_module_path: String,
    mode: Option<KeyMode>,
    html_comments: Option<bool>,
    base_dir: Option<PathBuf>,
}

impl CompileOptions {
    /// Create options with defaults for the given environment module
    pub fn new(environment_module_path: impl Into<String>) -> Self {
        Self {
            environment_module_path: environment_module_path.into(),
            mode: KeyMode::default(),
            html_comments: false,
            base_dir: None,
        }
    }

    /// Set the key generation mode
    pub fn with_mode(mut self, mode: KeyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable HTML source markers
    pub fn with_html_comments(mut self, html_comments: bool) -> Self {
        self.html_comments = html_comments;
        self
    }

    /// Set the base directory for relativizing marker paths
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load options from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlOptions = toml::from_str(content)?;
        let options = Self {
            environment_module_path: parsed.environment_module_path,
            mode: parsed.mode.unwrap_or_default(),
            html_comments: parsed.html_comments.unwrap_or(false),
            base_dir: parsed.base_dir,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check the options before any compilation work starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment_module_path.is_empty() {
            return Err(ConfigError::MissingEnvironmentModule);
        }
        Ok(())
    }
}
