//! Sprig - compiles Twig-style templates into self-contained JS modules
//!
//! A template is parsed, every reference to another template (include,
//! import, extends, embed and the `include(...)` function) is resolved
//! against a pluggable [`Loader`] and rewritten to a stable registry key,
//! and the result is emitted as a JavaScript module that requires its
//! dependencies, registers the compiled template in a shared runtime
//! environment and exports a render entry point.
//!
//! # Example
//!
//! ```rust
//! use sprig::{compile_str, ArrayLoader, CompileOptions};
//!
//! # async fn demo() -> Result<(), sprig::CompileError> {
//! let loader = ArrayLoader::new();
//! let options = CompileOptions::new("./runtime/env.js");
//! let module = compile_str("Hello {{ name }}", "index.html", &loader, &options).await?;
//! assert!(module.code.contains("registerTemplatesModule"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod hash;
pub mod loader;
pub mod parser;
pub mod precompile;
pub mod resolver;

pub use config::{CompileOptions, ConfigError};
pub use error::ParseError;
pub use hash::{KeyMode, TemplateHasher};
pub use loader::{ArrayLoader, ChainLoader, FilesystemLoader, Loader, LoaderError, SourceContext};
pub use parser::{parse, Module};
pub use precompile::{JsonPrecompiler, PrecompileError, Precompiler};
pub use resolver::{resolve_references, ReferenceResolver, ResolveError};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::hash::normalize_slashes;

/// Errors that can occur during the compile pipeline
#[derive(Debug, Error)]
pub enum CompileError {
    /// Invalid compile options
    #[error("invalid options: {0}")]
    Config(#[from] ConfigError),

    /// Error during parsing
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// Error during reference resolution
    #[error("reference resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Error while producing the executable template form
    #[error("precompilation failed: {0}")]
    Precompile(#[from] PrecompileError),

    /// Error reading the template source
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Vec<ParseError>> for CompileError {
    fn from(errors: Vec<ParseError>) -> Self {
        CompileError::Parse(errors)
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Output of one compilation
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Emitted JavaScript module text
    pub code: String,
    /// Registry key of the root template
    pub key: String,
    /// Resolved dependency paths in first-discovery order
    pub dependencies: Vec<PathBuf>,
}

/// Wrap template source in HTML markers naming its origin
fn wrap_html_comments(source: &str, resource_path: &Path, base_dir: Option<&Path>) -> String {
    let display = base_dir
        .and_then(|base| resource_path.strip_prefix(base).ok())
        .unwrap_or(resource_path);
    let display = normalize_slashes(display);
    format!(
        "<!-- START: {} -->\n{}\n<!-- END: {} -->",
        display, source, display
    )
}

/// Compile template source into a self-contained runtime module.
///
/// `resource_path` is the path of the template being compiled; it seeds the
/// root registry key and is the context against which the loader resolves
/// relative references. Any failure leaves no partial output.
pub async fn compile_str(
    source: &str,
    resource_path: impl AsRef<Path>,
    loader: &dyn Loader,
    options: &CompileOptions,
) -> Result<CompiledModule, CompileError> {
    let resource_path = resource_path.as_ref();
    options.validate()?;

    let hasher = TemplateHasher::new(options.mode);
    let key = hasher.key(resource_path);

    let source = if options.html_comments {
        wrap_html_comments(source, resource_path, options.base_dir.as_deref())
    } else {
        source.to_string()
    };

    debug!(path = %resource_path.display(), key = %key, "compiling template");
    let mut module = parser::parse(&source)?;

    let from = SourceContext::new(resource_path);
    let dependencies = resolver::resolve_references(&mut module, loader, from, &hasher).await?;
    debug!(count = dependencies.len(), "resolved template dependencies");

    let precompiled = JsonPrecompiler.precompile(&module, &key)?;
    let code = emitter::emit_module(
        &precompiled,
        &key,
        &dependencies,
        &options.environment_module_path,
    );

    Ok(CompiledModule {
        code,
        key,
        dependencies,
    })
}

/// Compile a template file into a self-contained runtime module.
///
/// The path is canonicalized first so keys and relative resolution behave
/// the same however the file was addressed.
pub async fn compile_file(
    path: impl AsRef<Path>,
    loader: &dyn Loader,
    options: &CompileOptions,
) -> Result<CompiledModule, CompileError> {
    let path = path.as_ref();
    let source = tokio::fs::read_to_string(path).await?;
    let resource_path = tokio::fs::canonicalize(path).await?;
    compile_str(&source, &resource_path, loader, options).await
}
