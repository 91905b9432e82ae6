use tree_sitter::Language;

pub struct LanguageConfig {
    pub name: &'static str,
    pub language: Language,
    pub extensions: &'static [&'static str],
    /// Captures `@export` (the export statement) and `@declaration`.
    pub export_query: &'static str,
}

/// Top-level `export <declaration>` statements. Re-export lists
/// (`export { a } from "./a"`) carry no declaration and never match.
const EXPORT_QUERY: &str = r#"
(program
  (export_statement
    declaration: (_) @declaration) @export)
"#;

impl LanguageConfig {
    pub fn get_all() -> Vec<LanguageConfig> {
        vec![typescript_config(), tsx_config(), javascript_config()]
    }

    pub fn get_by_extension(ext: &str) -> Option<LanguageConfig> {
        Self::get_all()
            .into_iter()
            .find(|c| c.extensions.contains(&ext))
    }

    pub fn get_by_name(name: &str) -> Option<LanguageConfig> {
        Self::get_all().into_iter().find(|c| c.name == name)
    }
}

fn typescript_config() -> LanguageConfig {
    LanguageConfig {
        name: "typescript",
        language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        extensions: &["ts", "mts", "cts"],
        export_query: EXPORT_QUERY,
    }
}

fn tsx_config() -> LanguageConfig {
    LanguageConfig {
        name: "tsx",
        language: tree_sitter_typescript::LANGUAGE_TSX.into(),
        extensions: &["tsx"],
        export_query: EXPORT_QUERY,
    }
}

fn javascript_config() -> LanguageConfig {
    LanguageConfig {
        name: "javascript",
        language: tree_sitter_javascript::LANGUAGE.into(),
        extensions: &["js", "mjs", "cjs", "jsx"],
        export_query: EXPORT_QUERY,
    }
}
