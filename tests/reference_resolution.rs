//! End-to-end reference resolution over real template directories

use std::fs;
use std::path::{Path, PathBuf};

use sprig::{
    parse, resolve_references, ArrayLoader, FilesystemLoader, KeyMode, SourceContext,
    TemplateHasher,
};

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    fs::canonicalize(&path).unwrap()
}

#[tokio::test]
async fn test_first_discovery_order_is_traversal_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.html", "A");
    let b = write_file(dir.path(), "b.html", "B");
    let index = write_file(dir.path(), "index.twig", "");

    // b.html is discovered inside the conditional before a.html is reached,
    // and its later occurrence collapses into the first
    let source = r#"
        {% if x %}{% include "b.html" %}{% endif %}
        {% include "a.html" %}
        {% include "b.html" %}
    "#;

    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert_eq!(deps, vec![b, a]);
}

#[tokio::test]
async fn test_non_reference_strings_preserved_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let index = write_file(dir.path(), "index.twig", "");

    let source = r#"{% include "hello.html" %}{{ "just-data.html" }}"#;
    let pristine = parse(source).unwrap();

    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert!(deps.is_empty());
    assert_eq!(module, pristine);
}

#[tokio::test]
async fn test_loader_claim_without_backing_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let index = write_file(dir.path(), "index.twig", "");

    // The array loader claims the name exists, but resolves it to a path
    // with no file behind it
    let loader = ArrayLoader::new().with_template("ghost.html", "boo");
    let hasher = TemplateHasher::new(KeyMode::Development);

    let source = r#"{% include "ghost.html" %}"#;
    let pristine = parse(source).unwrap();
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert!(deps.is_empty());
    assert_eq!(module, pristine);
}

#[tokio::test]
async fn test_reparsed_template_resolves_identically() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.html", "base");
    write_file(dir.path(), "partial.html", "partial");
    let index = write_file(dir.path(), "index.twig", "");

    let source = r#"{% extends "base.html" %}{% block body %}{{ include("partial.html") }}{% endblock %}"#;
    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Production);

    let mut first = parse(source).unwrap();
    let first_deps =
        resolve_references(&mut first, &loader, SourceContext::new(&index), &hasher)
            .await
            .unwrap();

    let mut second = parse(source).unwrap();
    let second_deps =
        resolve_references(&mut second, &loader, SourceContext::new(&index), &hasher)
            .await
            .unwrap();

    assert_eq!(first_deps, second_deps);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_multi_template_array_resolves_value_slots() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.html", "A");
    let b = write_file(dir.path(), "b.html", "B");
    let index = write_file(dir.path(), "index.twig", "");

    let source = r#"{{ include(["a.html", "b.html"]) }}"#;
    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert_eq!(deps, vec![a, b]);
}

#[tokio::test]
async fn test_resolution_relative_to_referencing_template() {
    let dir = tempfile::tempdir().unwrap();
    let sibling = write_file(dir.path(), "pages/sidebar.html", "sidebar");
    let index = write_file(dir.path(), "pages/index.twig", "");

    let source = r#"{% include "sidebar.html" %}"#;
    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert_eq!(deps, vec![sibling]);
}

#[tokio::test]
async fn test_namespaced_roots_resolve() {
    let shared = tempfile::tempdir().unwrap();
    let header = write_file(shared.path(), "header.html", "header");
    let dir = tempfile::tempdir().unwrap();
    let index = write_file(dir.path(), "index.twig", "");

    let source = r#"{% include "@shared/header.html" %}"#;
    let loader = FilesystemLoader::new().with_namespace("shared", shared.path());
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert_eq!(deps, vec![header]);
}

#[tokio::test]
async fn test_embed_parent_resolves_before_body_includes() {
    let dir = tempfile::tempdir().unwrap();
    let frame = write_file(dir.path(), "frame.html", "frame");
    let late = write_file(dir.path(), "late.html", "late");
    let index = write_file(dir.path(), "index.twig", "");

    // The embedded template is visited at module level, before the body walk
    // reaches the include that precedes it in source order
    let source = r#"
        {% include "late.html" %}
        {% embed "frame.html" %}{% endembed %}
    "#;
    let loader = FilesystemLoader::new();
    let hasher = TemplateHasher::new(KeyMode::Development);
    let mut module = parse(source).unwrap();
    let deps = resolve_references(&mut module, &loader, SourceContext::new(&index), &hasher)
        .await
        .unwrap();

    assert_eq!(deps, vec![frame, late]);
}
