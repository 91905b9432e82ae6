/// End-to-end integration tests for the symref pipeline.
///
/// Tests the complete flow:
///   Sources → Generator → Catalog file → Transform → Markdown
use std::fs;
use std::path::Path;

use symref::catalog::{self, Catalog};
use symref::config::Config;
use symref::indexer::Generator;
use symref::resolver::{AmbiguityReason, ResolveError};
use symref::transform::{ReferenceTransform, TransformError};
use tempfile::{TempDir, tempdir};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Project with `Foo` declared twice and `Baz` once.
fn project() -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "a/x.ts",
        "/** The first Foo. */\nexport class Foo {\n  run(): void {}\n}\n",
    );
    write(root, "b/x.ts", "export interface Foo {\n  id: string;\n}\n");
    write(
        root,
        "c/z.ts",
        "/**\n * Computes a baz.\n * @param n - How many.\n */\nexport function Baz(n: number): number {\n  return n;\n}\n",
    );
    write(root, "c/internal.ts", "function hidden() {}\n");

    let config = Config {
        root: root.display().to_string(),
        source_patterns: vec!["**/*.ts".to_string()],
        exclude_patterns: Vec::new(),
        catalog_path: root.join("out/catalog.json").display().to_string(),
        cache_path: root.join("out/cache.json").display().to_string(),
        source_link_base: "https://example.com/".to_string(),
        ..Default::default()
    };
    (dir, config)
}

fn generate(config: &Config) -> Catalog {
    Generator::new(config.generate_options(false))
        .unwrap()
        .generate()
        .unwrap()
        .catalog
}

#[test]
fn test_generate_then_render() {
    let (_dir, config) = project();
    let catalog = generate(&config);

    assert_eq!(catalog.get("Foo").len(), 2);
    assert_eq!(catalog.get("Baz").len(), 1);
    assert!(catalog.get("hidden").is_empty());

    let loaded = catalog::load_shared(&config.catalog_path).expect("catalog written");
    assert_eq!(*loaded, catalog);

    let renderer = config.renderer();
    let transform = ReferenceTransform::new(Some(&*loaded), &renderer);
    let source = "\
# Guide

Start with {@a/Foo}, then call {@Baz}. {@Foo} and {@Bar} do not resolve.

```symbol show=\"signature,parameters\"
Baz
```
";
    let (output, report) = transform
        .apply_markdown(source, Some(Path::new("docs/guide.md")))
        .unwrap();

    assert_eq!(report.inline_resolved, 2);
    assert_eq!(report.blocks_resolved, 1);
    assert_eq!(report.diagnostics.len(), 2);

    match &report.diagnostics[0].error {
        ResolveError::Ambiguous {
            reason, candidates, ..
        } => {
            assert_eq!(*reason, AmbiguityReason::NoHint);
            assert_eq!(candidates, &vec!["a/x.ts#Foo", "b/x.ts#Foo"]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(
        report.diagnostics[1]
            .error
            .to_string()
            .starts_with("symbol \"Bar\" not found; did you mean: Baz")
    );

    assert!(output.contains("[`Foo`](https://example.com/a/x.ts#L2 \"The first Foo.\")"));
    assert!(output.contains("[`Baz`](https://example.com/c/z.ts#L5 \"Computes a baz.\")"));
    assert!(output.contains("symref-error"));
    assert!(output.contains("How many."));
    assert!(!output.contains("```symbol"));
}

#[test]
fn test_second_generation_reuses_cache() {
    let (_dir, config) = project();
    generate(&config);
    let first = fs::read(&config.catalog_path).unwrap();

    let generation = Generator::new(config.generate_options(false))
        .unwrap()
        .generate()
        .unwrap();
    assert_eq!(generation.stats.parsed, 0);
    assert_eq!(generation.stats.reused, 4);
    assert_eq!(fs::read(&config.catalog_path).unwrap(), first);
}

#[test]
fn test_missing_payload_aborts_document() {
    let (_dir, config) = project();
    let catalog = generate(&config);
    let renderer = config.renderer();
    let transform = ReferenceTransform::new(Some(&catalog), &renderer);

    let source = "```symbol\nBaz\n```\n\nText {@Baz}.\n\n```symbol\n```\n";
    let err = transform
        .apply_markdown(source, Some(Path::new("api.md")))
        .unwrap_err();
    match err {
        TransformError::MissingReferencePayload { location } => {
            assert_eq!(location.line, Some(7));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_hinted_block_resolves_interface() {
    let (_dir, config) = project();
    let catalog = generate(&config);
    let renderer = config.renderer();
    let transform = ReferenceTransform::new(Some(&catalog), &renderer);

    let (output, report) = transform
        .apply_markdown("```symbol\nb/x.ts#Foo\n```\n", None)
        .unwrap();
    assert_eq!(report.blocks_resolved, 1);
    assert!(output.contains("(interface)"));
    assert!(output.contains("id: string"));
}

#[test]
fn test_missing_catalog_leaves_documents_untouched() {
    let (dir, config) = project();
    let catalog = catalog::load_shared(dir.path().join("out/catalog.json"));
    assert!(catalog.is_none());

    let renderer = config.renderer();
    let transform = ReferenceTransform::new(catalog.as_deref(), &renderer);
    let source = "See {@Foo}.\n\n```symbol\n```\n";
    let (output, report) = transform.apply_markdown(source, None).unwrap();
    assert!(report.skipped);
    assert_eq!(output, source);
}
