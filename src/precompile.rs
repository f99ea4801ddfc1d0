//! Compilation of a resolved module into its executable form
//!
//! The emitter treats the compiled template as opaque text; this module
//! provides the seam that produces it. The shipped implementation flattens
//! the rewritten AST to JSON inside a `module.exports` assignment, which the
//! runtime environment's template interpreter loads and registers.

use thiserror::Error;

use crate::parser::ast::Module;

/// Errors raised while producing the executable template form
#[derive(Debug, Error)]
pub enum PrecompileError {
    #[error("failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Turns a resolved module into executable template text
pub trait Precompiler {
    fn precompile(&self, module: &Module, key: &str) -> Result<String, PrecompileError>;
}

/// Precompiler emitting the module AST as JSON
#[derive(Debug, Default)]
pub struct JsonPrecompiler;

impl Precompiler for JsonPrecompiler {
    fn precompile(&self, module: &Module, key: &str) -> Result<String, PrecompileError> {
        let ast = serde_json::to_string(module)?;
        Ok(format!(
            "module.exports = {{\n    key: {},\n    template: {}\n}};",
            serde_json::to_string(key)?,
            ast
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_precompiled_form_is_module_exports_assignment() {
        let module = parse("hello").unwrap();
        let compiled = JsonPrecompiler.precompile(&module, "index.html").unwrap();
        assert!(compiled.starts_with("module.exports = {"));
        assert!(compiled.ends_with("};"));
        assert!(compiled.contains(r#"key: "index.html""#));
        assert!(compiled.contains(r#""kind":"text""#));
    }

    #[test]
    fn test_key_is_json_escaped() {
        let module = parse("x").unwrap();
        let compiled = JsonPrecompiler
            .precompile(&module, r#"we"ird\key"#)
            .unwrap();
        assert!(compiled.contains(r#"key: "we\"ird\\key""#));
    }
}
