/// Configuration module for symref.
///
/// Handles loading, validating, and providing default configuration values.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::GenerateOptions;
use crate::render::Renderer;
use crate::resolver::DEFAULT_MAX_SUGGESTIONS;

pub const DEFAULT_CONFIG_PATH: &str = "symref.json";

// ── Default value functions ──────────────────────────────────────────

fn default_root() -> String {
    ".".to_string()
}

fn default_source_patterns() -> Vec<String> {
    ["**/*.ts", "**/*.tsx", "**/*.mts", "**/*.js", "**/*.mjs"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    ["**/node_modules/**", "**/*.test.*", "**/*.spec.*", "**/dist/**"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_document_patterns() -> Vec<String> {
    vec!["docs/**/*.md".to_string()]
}

fn default_catalog_path() -> String {
    ".symref/catalog.json".to_string()
}

fn default_cache_path() -> String {
    ".symref/cache.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_suggestions() -> usize {
    DEFAULT_MAX_SUGGESTIONS
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directory walked for sources; origins are recorded relative to it.
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default = "default_source_patterns")]
    pub source_patterns: Vec<String>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Documents rendered when `symref render` is given no files.
    #[serde(default = "default_document_patterns")]
    pub document_patterns: Vec<String>,

    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Prefix of every source link, e.g. `https://github.com/o/r/blob/main/`.
    #[serde(default)]
    pub source_link_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            source_patterns: default_source_patterns(),
            exclude_patterns: default_exclude_patterns(),
            document_patterns: default_document_patterns(),
            catalog_path: default_catalog_path(),
            cache_path: default_cache_path(),
            respect_gitignore: default_true(),
            max_suggestions: default_max_suggestions(),
            source_link_base: String::new(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Invalid JSON is logged and also
    /// yields the defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("{} not found, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", config_path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {}", config_path.display());

        if cfg.source_patterns.is_empty() {
            cfg.source_patterns = default_source_patterns();
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.root.is_empty(), "root must not be empty");
        anyhow::ensure!(
            !self.source_patterns.is_empty(),
            "at least one source pattern must be specified"
        );
        anyhow::ensure!(!self.catalog_path.is_empty(), "catalog_path must not be empty");
        anyhow::ensure!(!self.cache_path.is_empty(), "cache_path must not be empty");
        anyhow::ensure!(
            self.catalog_path != self.cache_path,
            "catalog_path and cache_path must differ"
        );
        for pattern in self.source_patterns.iter().chain(&self.exclude_patterns) {
            globset::Glob::new(pattern).with_context(|| format!("invalid pattern: {pattern}"))?;
        }
        Ok(())
    }

    /// Generator options; `force` ignores the cache.
    #[must_use]
    pub fn generate_options(&self, force: bool) -> GenerateOptions {
        GenerateOptions {
            root: PathBuf::from(&self.root),
            source_patterns: self.source_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            cache_path: PathBuf::from(&self.cache_path),
            catalog_path: PathBuf::from(&self.catalog_path),
            respect_gitignore: self.respect_gitignore,
            force,
        }
    }

    #[must_use]
    pub fn renderer(&self) -> Renderer {
        Renderer::new(&self.source_link_base)
    }

    /// Expand `document_patterns` to existing files, sorted and deduplicated.
    pub fn document_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for pattern in &self.document_patterns {
            let matches = glob::glob(pattern)
                .with_context(|| format!("invalid document pattern: {pattern}"))?;
            for entry in matches {
                match entry {
                    Ok(path) if path.is_file() => {
                        files.insert(path);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to read {}: {e}", e.path().display()),
                }
            }
        }

        Ok(files.into_iter().collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
