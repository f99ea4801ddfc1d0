//! Template loaders
//!
//! A [`Loader`] maps a template name, relative to the template that
//! references it, onto a concrete file path - or confirms that the name is
//! resolvable at all. Loader lookups are asynchronous; each call is a
//! suspension point for the caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

mod array;
mod chain;
mod filesystem;

pub use array::ArrayLoader;
pub use chain::ChainLoader;
pub use filesystem::FilesystemLoader;

/// Errors raised by loader operations
///
/// A name that simply is not known to the loader is not an error:
/// [`Loader::exists`] reports it as `Ok(false)`. Errors are reserved for
/// lookups that could not be carried out.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// `resolve` was called for a name the loader does not know
    #[error("template '{name}' not found")]
    NotFound { name: String },

    /// The name would escape the configured template roots
    #[error("template name '{name}' is outside the configured template roots")]
    InvalidName { name: String },

    /// The underlying lookup failed
    #[error("i/o error while resolving template: {0}")]
    Io(#[from] std::io::Error),
}

/// The template from which a reference is being resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    path: PathBuf,
}

impl SourceContext {
    /// Create a context for the given referencing template path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the referencing template
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory of the referencing template, if it has one
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

/// Maps template names onto resolvable file paths.
///
/// `resolve` is only called after `exists` returned true for the same name
/// and context; a loader may still answer `NotFound` if its state changed
/// in between.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Whether `name` denotes a template resolvable relative to `from`
    async fn exists(&self, name: &str, from: &SourceContext) -> Result<bool, LoaderError>;

    /// Resolve `name` relative to `from` to a concrete file path
    async fn resolve(&self, name: &str, from: &SourceContext) -> Result<PathBuf, LoaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_context_directory() {
        let ctx = SourceContext::new("/templates/pages/index.html");
        assert_eq!(ctx.path(), Path::new("/templates/pages/index.html"));
        assert_eq!(ctx.directory(), Some(Path::new("/templates/pages")));
    }

    #[test]
    fn test_source_context_bare_name_has_no_directory() {
        let ctx = SourceContext::new("index.html");
        assert_eq!(ctx.directory(), None);
    }
}
