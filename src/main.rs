use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use symref::catalog;
use symref::config::{Config, DEFAULT_CONFIG_PATH};
use symref::indexer::Generator;
use symref::resolver::Resolver;
use symref::transform::ReferenceTransform;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "symref", version, about = "Resolve symbol references in documentation")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan sources and write the catalog.
    Generate {
        /// Ignore the cache and reparse every file.
        #[arg(long)]
        force: bool,
    },
    /// Expand references in Markdown documents.
    Render {
        /// Documents to render; defaults to `document_patterns`.
        files: Vec<PathBuf>,
        /// Write results here instead of stdout.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Resolve one reference and print where it points.
    Resolve { reference: String },
    /// Write a configuration file with the defaults.
    Init,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::Init = cli.command {
        anyhow::ensure!(
            !cli.config.exists(),
            "{} already exists",
            cli.config.display()
        );
        Config::default().save(&cli.config)?;
        info!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Generate { force } => {
            let generation = Generator::new(config.generate_options(force))?.generate()?;
            let stats = generation.stats;
            println!(
                "{} declarations from {} files ({} reused, {} parsed, {} failed)",
                generation.catalog.declaration_count(),
                stats.scanned,
                stats.reused,
                stats.parsed,
                stats.failed
            );
        }
        Command::Render { files, out_dir } => render(&config, files, out_dir.as_deref())?,
        Command::Resolve { reference } => {
            let catalog = catalog::Catalog::load(&config.catalog_path)?;
            let resolved = Resolver::new(&catalog)
                .with_max_suggestions(config.max_suggestions)
                .resolve_str(&reference)?;
            let line = resolved
                .member
                .map_or(resolved.declaration.line, |m| m.line);
            println!(
                "{} {}:{line}",
                resolved.display_name(),
                resolved.declaration.origin
            );
        }
        Command::Init => {}
    }

    Ok(())
}

fn render(config: &Config, files: Vec<PathBuf>, out_dir: Option<&Path>) -> Result<()> {
    let files = if files.is_empty() {
        config.document_files()?
    } else {
        files
    };
    if files.is_empty() {
        warn!("No documents to render");
        return Ok(());
    }

    let catalog = catalog::load_shared(&config.catalog_path);
    let renderer = config.renderer();
    let transform = ReferenceTransform::new(catalog.as_deref(), &renderer)
        .with_max_suggestions(config.max_suggestions);

    let mut unresolved = 0;
    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let (output, report) = transform.apply_markdown(&text, Some(file))?;
        unresolved += report.diagnostics.len();

        match out_dir {
            Some(dir) => {
                let target = dir.join(relative_output(file));
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                std::fs::write(&target, output)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
            None => print!("{output}"),
        }
    }

    info!(
        "Rendered {} documents ({unresolved} unresolved inline references)",
        files.len()
    );
    Ok(())
}

/// Path of `file` below the output directory: relative paths keep their
/// directories, anything else keeps only its file name.
fn relative_output(file: &Path) -> PathBuf {
    let normal: PathBuf = file
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    let escapes = file
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        file.file_name().map(PathBuf::from).unwrap_or(normal)
    } else {
        normal
    }
}
