//! Emission of the self-registering runtime module
//!
//! Given the precompiled template text, the root registry key and the
//! resolved dependency list, produces a JavaScript module that requires each
//! dependency, registers the compiled template under its key in the shared
//! runtime environment and exports an async render entry point.

use std::path::{Path, PathBuf};

use crate::hash::normalize_slashes;

/// Escape a string for a single-quoted JavaScript literal
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Emit the runtime module text.
///
/// Dependency paths are emitted with forward slashes; `require` takes
/// module names separated that way on every platform.
pub fn emit_module(
    precompiled: &str,
    key: &str,
    dependencies: &[PathBuf],
    environment_module_path: &str,
) -> String {
    let mut parts = Vec::with_capacity(dependencies.len() + 4);

    parts.push(format!(
        "const env = require('{}');",
        js_escape(&normalize_slashes(Path::new(environment_module_path)))
    ));

    parts.push(format!(
        "let templatesModule = (() => {{\nlet module = {{\n    exports: undefined\n}};\n\n{}\n\n    return module.exports;\n}})();\n",
        precompiled
    ));

    for dependency in dependencies {
        parts.push(format!(
            "require('{}');",
            js_escape(&normalize_slashes(dependency))
        ));
    }

    parts.push(format!(
        "env.registerTemplatesModule(templatesModule, '{}');",
        js_escape(key)
    ));

    parts.push(format!(
        "\nlet template = env.loadTemplate('{}');\n\nmodule.exports = (context = {{}}) => {{\n    return template.then((template) => template.render(context));\n}};",
        js_escape(key)
    ));

    parts.join("\n")
}
