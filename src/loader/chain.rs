//! Loader that delegates to an ordered list of loaders

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Loader, LoaderError, SourceContext};

/// Tries each inner loader in registration order; the first one that knows
/// a name answers for it. An error from an inner loader propagates instead
/// of being treated as "does not exist".
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ChainLoader {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loader to the chain
    pub fn with_loader(mut self, loader: Box<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Append a loader to the chain
    pub fn push(&mut self, loader: Box<dyn Loader>) {
        self.loaders.push(loader);
    }
}

#[async_trait]
impl Loader for ChainLoader {
    async fn exists(&self, name: &str, from: &SourceContext) -> Result<bool, LoaderError> {
        for loader in &self.loaders {
            if loader.exists(name, from).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn resolve(&self, name: &str, from: &SourceContext) -> Result<PathBuf, LoaderError> {
        for loader in &self.loaders {
            if loader.exists(name, from).await? {
                return loader.resolve(name, from).await;
            }
        }
        Err(LoaderError::NotFound {
            name: name.to_string(),
        })
    }
}
