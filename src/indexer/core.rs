use super::code_parser::{DeclarationParser, ParseError};
use crate::catalog::cache::{CacheEntry, CacheFile, fingerprint};
use crate::catalog::{Catalog, CatalogError};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error(transparent)]
    Parser(#[from] ParseError),

    #[error("failed to write generator output: {0}")]
    Output(#[source] CatalogError),
}

/// Inputs of one generator run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory walked for sources; origins are recorded relative to it.
    pub root: PathBuf,
    pub source_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub cache_path: PathBuf,
    pub catalog_path: PathBuf,
    pub respect_gitignore: bool,
    /// Ignore the cache and reparse everything.
    pub force: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateStats {
    pub scanned: usize,
    pub reused: usize,
    pub parsed: usize,
    pub failed: usize,
    /// Cache entries dropped because their file is gone or no longer matched.
    pub removed: usize,
}

#[derive(Debug)]
pub struct Generation {
    pub catalog: Catalog,
    pub stats: GenerateStats,
}

/// Source file selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the root.
    pub origin: String,
    pub language: &'static str,
}

pub struct Generator {
    options: GenerateOptions,
    include: GlobSet,
    exclude: GlobSet,
    parser: DeclarationParser,
}

impl Generator {
    pub fn new(options: GenerateOptions) -> Result<Self, GenerateError> {
        let include = build_globset(&options.source_patterns)?;
        let exclude = build_globset(&options.exclude_patterns)?;
        Ok(Self {
            options,
            include,
            exclude,
            parser: DeclarationParser::new()?,
        })
    }

    /// Matched source files in sorted origin order.
    pub fn collect_files(&self) -> Vec<SourceFile> {
        let root = &self.options.root;
        let respect = self.options.respect_gitignore;

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(respect)
            .git_exclude(respect)
            .git_global(respect)
            .require_git(false)
            .filter_entry(|e| e.file_name() != ".git")
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let origin = relative_origin(root, path);
            if !self.include.is_match(&origin) || self.exclude.is_match(&origin) {
                continue;
            }

            match DeclarationParser::language_for(path) {
                Some(language) => files.push(SourceFile {
                    path: path.to_path_buf(),
                    origin,
                    language,
                }),
                None => debug!("Skipping {origin}: unsupported file type"),
            }
        }

        files.sort_by(|a, b| a.origin.cmp(&b.origin));
        files
    }

    /// Scan, extract, merge and persist catalog + cache.
    pub fn generate(&self) -> Result<Generation, GenerateError> {
        let previous = self.load_cache();
        let mut next = CacheFile::default();
        let mut stats = GenerateStats::default();

        for file in self.collect_files() {
            stats.scanned += 1;
            match self.process_file(&file, previous.get(&file.origin)) {
                Ok((entry, reused)) => {
                    if reused {
                        stats.reused += 1;
                    } else {
                        stats.parsed += 1;
                    }
                    next.entries.insert(file.origin, entry);
                }
                Err(e) => {
                    // The stale entry is not carried over.
                    warn!("Skipping {}: {e}", file.origin);
                    stats.failed += 1;
                }
            }
        }

        stats.removed = previous
            .entries
            .keys()
            .filter(|k| !next.entries.contains_key(*k))
            .count();

        let catalog = Catalog::from_declarations(
            next.entries
                .values()
                .flat_map(|e| e.declarations.iter().cloned()),
        );

        catalog
            .save(&self.options.catalog_path)
            .map_err(GenerateError::Output)?;
        next.save(&self.options.cache_path)
            .map_err(GenerateError::Output)?;

        info!(
            "Catalog generated: {} names from {} files (reused {}, parsed {}, failed {}, removed {})",
            catalog.len(),
            stats.scanned,
            stats.reused,
            stats.parsed,
            stats.failed,
            stats.removed
        );

        Ok(Generation { catalog, stats })
    }

    fn load_cache(&self) -> CacheFile {
        if self.options.force {
            return CacheFile::default();
        }
        match CacheFile::load(&self.options.cache_path) {
            Ok(cache) => {
                if !cache.is_empty() {
                    debug!("Loaded cache with {} entries", cache.len());
                }
                cache
            }
            Err(CatalogError::Missing(_)) => CacheFile::default(),
            Err(e) => {
                warn!("Ignoring cache: {e}");
                CacheFile::default()
            }
        }
    }

    /// Returns the refreshed entry and whether it came from the cache.
    fn process_file(
        &self,
        file: &SourceFile,
        cached: Option<&CacheEntry>,
    ) -> Result<(CacheEntry, bool), FileError> {
        let metadata = fs::metadata(&file.path)?;
        let size = metadata.len();
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let content = fs::read(&file.path)?;
        let digest = fingerprint(&content);

        // The fingerprint is checked even when size and mtime match.
        if let Some(entry) = cached {
            if entry.matches_stat(size, modified) {
                if entry.fingerprint == digest {
                    return Ok((entry.clone(), true));
                }
                debug!("{}: content changed under identical stat", file.origin);
            }
        }

        let declarations = self
            .parser
            .parse_code(&content, file.language, &file.origin)?;

        Ok((
            CacheEntry {
                size,
                modified,
                fingerprint: digest,
                declarations,
            },
            false,
        ))
    }
}

#[derive(Error, Debug)]
enum FileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Generate a catalog for sources under the current directory.
pub fn generate(
    source_patterns: &[String],
    exclude_patterns: &[String],
    cache_path: &Path,
    output_path: &Path,
) -> Result<Catalog, GenerateError> {
    let generator = Generator::new(GenerateOptions {
        root: PathBuf::from("."),
        source_patterns: source_patterns.to_vec(),
        exclude_patterns: exclude_patterns.to_vec(),
        cache_path: cache_path.to_path_buf(),
        catalog_path: output_path.to_path_buf(),
        respect_gitignore: true,
        force: false,
    })?;
    Ok(generator.generate()?.catalog)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, GenerateError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| GenerateError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| GenerateError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

fn relative_origin(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
