//! Filesystem-backed template loader

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{Loader, LoaderError, SourceContext};

/// Resolves template names against the referencing template's directory and
/// a set of root directories.
///
/// Names of the form `@namespace/rest` are looked up in the directories
/// registered for that namespace instead of the default roots.
#[derive(Debug, Default)]
pub struct FilesystemLoader {
    roots: Vec<PathBuf>,
    namespaces: HashMap<String, Vec<PathBuf>>,
}

impl FilesystemLoader {
    /// Create a loader with no roots; names resolve relative to the
    /// referencing template only
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Add a root directory for a namespace
    pub fn with_namespace(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.namespaces
            .entry(name.into())
            .or_default()
            .push(root.into());
        self
    }

    /// Registered root directories
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `name` if some candidate directory contains it as a file
    async fn try_resolve(
        &self,
        name: &str,
        from: &SourceContext,
    ) -> Result<Option<PathBuf>, LoaderError> {
        validate_name(name)?;

        let (dirs, rest): (Vec<&Path>, &str) = match name.strip_prefix('@') {
            Some(qualified) => {
                let (namespace, rest) = match qualified.split_once('/') {
                    Some(parts) => parts,
                    None => return Ok(None),
                };
                match self.namespaces.get(namespace) {
                    Some(roots) => (roots.iter().map(PathBuf::as_path).collect(), rest),
                    None => return Ok(None),
                }
            }
            None => {
                let mut dirs: Vec<&Path> = Vec::with_capacity(self.roots.len() + 1);
                if let Some(dir) = from.directory() {
                    dirs.push(dir);
                }
                dirs.extend(self.roots.iter().map(PathBuf::as_path));
                (dirs, name)
            }
        };

        for dir in dirs {
            let candidate = dir.join(rest);
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => {
                    let resolved = tokio::fs::canonicalize(&candidate).await?;
                    return Ok(Some(resolved));
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

/// Reject names whose `..` components would climb out of a candidate
/// directory
fn validate_name(name: &str) -> Result<(), LoaderError> {
    let mut depth: i32 = 0;
    for component in Path::new(name).components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(LoaderError::InvalidName {
                        name: name.to_string(),
                    });
                }
            }
            Component::Normal(_) => depth += 1,
            _ => {}
        }
    }
    Ok(())
}

#[async_trait]
impl Loader for FilesystemLoader {
    async fn exists(&self, name: &str, from: &SourceContext) -> Result<bool, LoaderError> {
        Ok(self.try_resolve(name, from).await?.is_some())
    }

    async fn resolve(&self, name: &str, from: &SourceContext) -> Result<PathBuf, LoaderError> {
        self.try_resolve(name, from)
            .await?
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
            })
    }
}
