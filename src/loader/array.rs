//! In-memory template loader

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{Loader, LoaderError, SourceContext};

/// Serves templates from an in-memory name/source map.
///
/// `resolve` returns the name itself as the path, so entries keyed by real
/// file paths survive the resolver's on-disk verification while purely
/// logical names do not.
#[derive(Debug, Default)]
pub struct ArrayLoader {
    templates: HashMap<String, String>,
}

impl ArrayLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template under `name`
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Insert a template under `name`
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    /// The stored source for `name`, if any
    pub fn source(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }
}

#[async_trait]
impl Loader for ArrayLoader {
    async fn exists(&self, name: &str, _from: &SourceContext) -> Result<bool, LoaderError> {
        Ok(self.templates.contains_key(name))
    }

    async fn resolve(&self, name: &str, _from: &SourceContext) -> Result<PathBuf, LoaderError> {
        if self.templates.contains_key(name) {
            Ok(PathBuf::from(name))
        } else {
            Err(LoaderError::NotFound {
                name: name.to_string(),
            })
        }
    }
}
