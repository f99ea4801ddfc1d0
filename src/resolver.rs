//! Template-reference resolution
//!
//! Walks a parsed [`Module`], finds every string constant that denotes
//! another template (include/import/extends/embed positions and the
//! `include(...)` function), resolves it against a [`Loader`], rewrites the
//! constant to its registry key and records the resolved file path as a
//! build dependency.
//!
//! The walk is a single depth-first pass with one loader lookup in flight
//! at a time, so the dependency list order is the deterministic traversal
//! order. Re-running the resolver on an already-rewritten tree changes
//! nothing: rewritten constants no longer pass the loader's existence check.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, trace};

use crate::hash::TemplateHasher;
use crate::loader::{Loader, LoaderError, SourceContext};
use crate::parser::ast::{Expr, Module, Node, Value};

/// Errors that abort a resolution pass
///
/// A name the loader does not know is not an error - the constant is simply
/// left unchanged. Errors mean the loader itself failed, and no partially
/// rewritten tree or partial dependency list is usable.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The loader failed during an existence check or a resolve call
    #[error("loader failed while resolving '{name}': {source}")]
    Loader {
        name: String,
        #[source]
        source: LoaderError,
    },
}

/// Resolves template references in one module tree.
///
/// Owns the dependency list for a single traversal; the list is ordered by
/// first discovery and deduplicated by resolved path.
pub struct ReferenceResolver<'a> {
    loader: &'a dyn Loader,
    from: SourceContext,
    hasher: &'a TemplateHasher,
    dependencies: Vec<PathBuf>,
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver for references found in the template at `from`
    pub fn new(loader: &'a dyn Loader, from: SourceContext, hasher: &'a TemplateHasher) -> Self {
        Self {
            loader,
            from,
            hasher,
            dependencies: Vec::new(),
        }
    }

    /// Dependencies discovered so far, in first-discovery order
    pub fn dependencies(&self) -> &[PathBuf] {
        &self.dependencies
    }

    /// Consume the resolver and return the dependency list
    pub fn into_dependencies(self) -> Vec<PathBuf> {
        self.dependencies
    }

    /// Visit a module: its parent expression is a reference site, embedded
    /// sub-templates get the full visit, then the body is walked.
    pub async fn resolve_module(&mut self, module: &mut Module) -> Result<(), ResolveError> {
        if let Some(parent) = module.parent.as_mut() {
            self.process_reference(parent).await?;
            self.visit_expr(parent).await?;
        }
        for embedded in module.embedded.iter_mut() {
            Box::pin(self.resolve_module(embedded)).await?;
        }
        for node in module.body.iter_mut() {
            self.visit_node(node).await?;
        }
        Ok(())
    }

    /// Visit one body node and recurse into all of its children
    async fn visit_node(&mut self, node: &mut Node) -> Result<(), ResolveError> {
        match node {
            Node::Include {
                expr, variables, ..
            } => {
                self.process_reference(expr).await?;
                self.visit_expr(expr).await?;
                if let Some(variables) = variables {
                    self.visit_expr(variables).await?;
                }
            }
            Node::Import { expr, .. } => {
                self.process_reference(expr).await?;
                self.visit_expr(expr).await?;
            }
            Node::Print { expr } => self.visit_expr(expr).await?,
            Node::Set { value, .. } => self.visit_expr(value).await?,
            Node::If { arms, else_body } => {
                for arm in arms.iter_mut() {
                    self.visit_expr(&mut arm.cond).await?;
                    for child in arm.body.iter_mut() {
                        Box::pin(self.visit_node(child)).await?;
                    }
                }
                for child in else_body.iter_mut() {
                    Box::pin(self.visit_node(child)).await?;
                }
            }
            Node::Block { body, .. } => {
                for child in body.iter_mut() {
                    Box::pin(self.visit_node(child)).await?;
                }
            }
            Node::Embed { variables, .. } => {
                // The embed target lives on the embedded module's parent
                // expression and is handled by resolve_module
                if let Some(variables) = variables {
                    self.visit_expr(variables).await?;
                }
            }
            Node::Text { .. } => {}
        }
        Ok(())
    }

    /// Walk an expression tree, treating the first argument of every
    /// `include(...)` call as a reference site
    async fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), ResolveError> {
        if let Expr::FunctionCall { name, args } = expr {
            if name == "include" {
                if let Some(first) = args.first_mut() {
                    self.process_reference(first).await?;
                }
            }
        }
        match expr {
            Expr::Array { items } => {
                for item in items.iter_mut() {
                    Box::pin(self.visit_expr(item)).await?;
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                Box::pin(self.visit_expr(cond)).await?;
                Box::pin(self.visit_expr(then)).await?;
                Box::pin(self.visit_expr(otherwise)).await?;
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args.iter_mut() {
                    Box::pin(self.visit_expr(arg)).await?;
                }
            }
            Expr::Filter { expr, args, .. } => {
                Box::pin(self.visit_expr(expr)).await?;
                for arg in args.iter_mut() {
                    Box::pin(self.visit_expr(arg)).await?;
                }
            }
            Expr::Concat { left, right } => {
                Box::pin(self.visit_expr(left)).await?;
                Box::pin(self.visit_expr(right)).await?;
            }
            Expr::Binary { left, right, .. } => {
                Box::pin(self.visit_expr(left)).await?;
                Box::pin(self.visit_expr(right)).await?;
            }
            Expr::Unary { expr, .. } => Box::pin(self.visit_expr(expr)).await?,
            Expr::GetAttr { expr, .. } => Box::pin(self.visit_expr(expr)).await?,
            Expr::Constant { .. } | Expr::Name { .. } => {}
        }
        Ok(())
    }

    /// Process an expression suspected of denoting a template name.
    ///
    /// Array literals have only their value slots (odd positional indices)
    /// checked; conditionals have both value branches checked but never the
    /// condition; string constants are candidates. Every other shape is a
    /// dynamic name and stays untouched for the runtime loader.
    async fn process_reference(&mut self, expr: &mut Expr) -> Result<(), ResolveError> {
        match expr {
            Expr::Array { items } => {
                for (index, item) in items.iter_mut().enumerate() {
                    if index % 2 == 1 {
                        Box::pin(self.process_reference(item)).await?;
                    }
                }
            }
            Expr::Conditional {
                then, otherwise, ..
            } => {
                Box::pin(self.process_reference(then)).await?;
                Box::pin(self.process_reference(otherwise)).await?;
            }
            Expr::Constant { value } => {
                if let Value::Str(name) = value {
                    if let Some(key) = self.resolve_candidate(name).await? {
                        *value = Value::Str(key);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve a single candidate name.
    ///
    /// Returns the registry key to rewrite the constant with, or `None` if
    /// the name is not a template reference. The resolved path must exist
    /// as a real file: a loader may claim a name exists in its logical
    /// namespace without a backing file being present, and such false
    /// positives must not become dependencies.
    async fn resolve_candidate(&mut self, name: &str) -> Result<Option<String>, ResolveError> {
        let exists = self
            .loader
            .exists(name, &self.from)
            .await
            .map_err(|source| ResolveError::Loader {
                name: name.to_string(),
                source,
            })?;
        if !exists {
            trace!(name, "not a template reference");
            return Ok(None);
        }

        let resolved = self
            .loader
            .resolve(name, &self.from)
            .await
            .map_err(|source| ResolveError::Loader {
                name: name.to_string(),
                source,
            })?;

        let is_file = tokio::fs::metadata(&resolved)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            trace!(name, path = %resolved.display(), "resolved path has no backing file");
            return Ok(None);
        }

        if !self.dependencies.contains(&resolved) {
            self.dependencies.push(resolved.clone());
        }
        let key = self.hasher.key(&resolved);
        debug!(name, path = %resolved.display(), key = %key, "resolved template reference");
        Ok(Some(key))
    }
}

/// Resolve all template references in `module`, rewriting reference
/// constants in place and returning the discovered dependency list.
pub async fn resolve_references(
    module: &mut Module,
    loader: &dyn Loader,
    from: SourceContext,
    hasher: &TemplateHasher,
) -> Result<Vec<PathBuf>, ResolveError> {
    let mut resolver = ReferenceResolver::new(loader, from, hasher);
    resolver.resolve_module(module).await?;
    Ok(resolver.into_dependencies())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::KeyMode;
    use crate::parser::parse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    /// Test loader mapping logical names onto explicit paths
    #[derive(Default)]
    struct MapLoader {
        paths: HashMap<String, PathBuf>,
    }

    impl MapLoader {
        fn with(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
            self.paths.insert(name.to_string(), path.into());
            self
        }
    }

    #[async_trait]
    impl Loader for MapLoader {
        async fn exists(&self, name: &str, _from: &SourceContext) -> Result<bool, LoaderError> {
            Ok(self.paths.contains_key(name))
        }

        async fn resolve(&self, name: &str, _from: &SourceContext) -> Result<PathBuf, LoaderError> {
            self.paths
                .get(name)
                .cloned()
                .ok_or_else(|| LoaderError::NotFound {
                    name: name.to_string(),
                })
        }
    }

    /// A loader that fails every lookup
    struct FailingLoader;

    #[async_trait]
    impl Loader for FailingLoader {
        async fn exists(&self, _name: &str, _from: &SourceContext) -> Result<bool, LoaderError> {
            Err(LoaderError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire")))
        }

        async fn resolve(
            &self,
            _name: &str,
            _from: &SourceContext,
        ) -> Result<PathBuf, LoaderError> {
            Err(LoaderError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire")))
        }
    }

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "content").unwrap();
        path
    }

    fn hasher() -> TemplateHasher {
        TemplateHasher::new(KeyMode::Development)
    }

    fn constant_str(expr: &Expr) -> &str {
        match expr {
            Expr::Constant {
                value: Value::Str(s),
            } => s.as_str(),
            other => panic!("Expected string constant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_include_tag_rewritten_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let partial = write_file(dir.path(), "partial.html");
        let loader = MapLoader::default().with("partial.html", &partial);

        let mut module = parse(r#"{% include "partial.html" %}"#).unwrap();
        let hasher = hasher();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher,
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![partial.clone()]);
        match &module.body[0] {
            Node::Include { expr, .. } => {
                assert_eq!(constant_str(expr), hasher.key(&partial));
            }
            other => panic!("Expected Include, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extends_reference_resolved_from_module_parent() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_file(dir.path(), "base.html");
        let loader = MapLoader::default().with("base.html", &base);

        let mut module = parse(r#"{% extends "base.html" %}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![base]);
        assert!(module.parent.is_some());
    }

    #[tokio::test]
    async fn test_unknown_name_left_untouched() {
        let loader = MapLoader::default();
        let mut module = parse(r#"{% include "hello.html" %}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert!(deps.is_empty());
        match &module.body[0] {
            Node::Include { expr, .. } => assert_eq!(constant_str(expr), "hello.html"),
            other => panic!("Expected Include, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_loader_false_positive_guarded_by_disk_check() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("ghost.html");
        let loader = MapLoader::default().with("ghost.html", &ghost);

        let mut module = parse(r#"{% include "ghost.html" %}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert!(deps.is_empty());
        match &module.body[0] {
            Node::Include { expr, .. } => assert_eq!(constant_str(expr), "ghost.html"),
            other => panic!("Expected Include, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_references_collapse_in_first_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.html");
        let b = write_file(dir.path(), "b.html");
        let loader = MapLoader::default().with("a.html", &a).with("b.html", &b);

        let source = r#"{% include "a.html" %}{% include "b.html" %}{% include "a.html" %}"#;
        let mut module = parse(source).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![a, b]);
    }

    #[tokio::test]
    async fn test_include_function_first_argument_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.html");
        let b = write_file(dir.path(), "b.html");
        let loader = MapLoader::default().with("a.html", &a).with("b.html", &b);

        // The second argument of include() is template variables, never a name
        let mut module = parse(r#"{{ include("a.html", "b.html") }}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![a]);
    }

    #[tokio::test]
    async fn test_other_function_calls_not_inspected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.html");
        let loader = MapLoader::default().with("a.html", &a);

        let mut module = parse(r#"{{ render("a.html") }}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert!(deps.is_empty());
    }

    #[tokio::test]
    async fn test_array_value_slots_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.html");
        // "key.html" exists under the loader but sits in a key slot
        let key_target = write_file(dir.path(), "key.html");
        let loader = MapLoader::default()
            .with("a.html", &a)
            .with("key.html", &key_target);

        let mut module = parse(r#"{{ include({"key.html": "a.html"}) }}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![a]);
    }

    #[tokio::test]
    async fn test_conditional_branches_but_not_condition() {
        let dir = tempfile::tempdir().unwrap();
        let t = write_file(dir.path(), "t.html");
        let f = write_file(dir.path(), "f.html");
        let cond_target = write_file(dir.path(), "cond.html");
        let loader = MapLoader::default()
            .with("t.html", &t)
            .with("f.html", &f)
            .with("cond.html", &cond_target);

        let mut module =
            parse(r#"{% include "cond.html" == "x" ? "t.html" : "f.html" %}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        // Both value branches resolve; the condition constant stays as data
        assert_eq!(deps, vec![t, f]);
    }

    #[tokio::test]
    async fn test_references_found_inside_unrelated_constructs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = write_file(dir.path(), "nested.html");
        let loader = MapLoader::default().with("nested.html", &nested);

        let source = r#"{% if user %}{% block inner %}{{ include("nested.html") }}{% endblock %}{% endif %}"#;
        let mut module = parse(source).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![nested]);
    }

    #[tokio::test]
    async fn test_embedded_template_parent_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let frame = write_file(dir.path(), "frame.html");
        let inner = write_file(dir.path(), "inner.html");
        let loader = MapLoader::default()
            .with("frame.html", &frame)
            .with("inner.html", &inner);

        let source =
            r#"{% embed "frame.html" %}{% include "inner.html" %}{% endembed %}"#;
        let mut module = parse(source).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await
        .unwrap();

        assert_eq!(deps, vec![frame, inner]);
        let embedded = &module.embedded[0];
        assert!(embedded.parent.is_some());
    }

    #[tokio::test]
    async fn test_loader_failure_aborts_pass() {
        let mut module = parse(r#"{% include "a.html" %}"#).unwrap();
        let result = resolve_references(
            &mut module,
            &FailingLoader,
            SourceContext::new("index.html"),
            &hasher(),
        )
        .await;

        assert!(matches!(result, Err(ResolveError::Loader { .. })));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let partial = write_file(dir.path(), "partial.html");
        let loader = MapLoader::default().with("partial.html", &partial);
        let hasher = hasher();

        let mut module = parse(r#"{% include "partial.html" %}"#).unwrap();
        let deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher,
        )
        .await
        .unwrap();
        let first_pass = module.clone();

        // A second pass over the rewritten tree finds nothing new: the key
        // fails the loader's existence check and passes through unchanged
        let second_deps = resolve_references(
            &mut module,
            &loader,
            SourceContext::new("index.html"),
            &hasher,
        )
        .await
        .unwrap();

        assert_eq!(module, first_pass);
        assert_eq!(deps.len(), 1);
        assert!(second_deps.is_empty());
    }
}
