//! # quire
//!
//! Command-line page renderer: loads settings and a page definition, wires
//! the HTTP fetch scheduler, cache backend, and module registry, and prints
//! the rendered document.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use quire_cache::open_backend;
use quire_fetch::{FetchScheduler, HttpScheduler, SchedulerConfig};
use quire_page::{ModuleRegistry, Page, PageDefinition};
use quire_settings::{LoggingSettings, QuireSettings};
use tracing::info;

/// Staged page composer.
#[derive(Parser, Debug)]
#[command(name = "quire", about = "Render page templates from modules and fetched data")]
struct Cli {
    /// Settings file (defaults to `~/.quire/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a page definition.
    Render(RenderArgs),
    /// List registered module identifiers.
    Modules,
    /// Remove one entry from the cache backend.
    Purge {
        /// Cache key.
        key: String,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Page definition (JSON).
    page: PathBuf,

    /// Extra page key, `NAME=VALUE`. Repeatable.
    #[arg(long = "key", value_parser = parse_key_value)]
    keys: Vec<(String, String)>,

    /// Request flag. The configured clear key forces a cache refresh.
    #[arg(long = "flag")]
    flags: Vec<String>,

    /// Bypass and purge cached module output.
    #[arg(long)]
    clear_cache: bool,

    /// Write the document here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Exit with an error when the render recorded any diagnostic.
    #[arg(long)]
    strict: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected NAME=VALUE, got \"{raw}\"")),
    }
}

fn init_logging(logging: &LoggingSettings) {
    if logging.json {
        quire_core::logging::init_json_subscriber(&logging.level);
    } else {
        quire_core::logging::init_subscriber(&logging.level);
    }
}

async fn render(settings: &QuireSettings, args: RenderArgs) -> Result<()> {
    let definition = PageDefinition::load(&args.page)
        .with_context(|| format!("Failed to load page {}", args.page.display()))?;
    let cache = open_backend(&settings.cache).context("Failed to open cache backend")?;
    let scheduler: Arc<dyn FetchScheduler> =
        Arc::new(HttpScheduler::new(SchedulerConfig::from(&settings.fetch)));
    let registry = Arc::new(ModuleRegistry::with_builtins());

    let mut builder = Page::builder(registry, scheduler)
        .settings(settings)
        .definition(&definition)
        .cache(cache)
        .force_refresh(args.clear_cache)
        .request_flags(args.flags.iter().map(String::as_str), &settings.cache.clear_key);
    for (name, value) in args.keys {
        builder = builder.key(name, value);
    }

    let output = builder.build().render().await;
    info!(
        page = %args.page.display(),
        rounds = output.rounds,
        diagnostics = output.diagnostics.len(),
        "render complete"
    );

    match &args.output {
        Some(path) => std::fs::write(path, &output.content)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", output.content),
    }

    if args.strict {
        if let Some(first) = output.diagnostics.first() {
            bail!(
                "{} diagnostic(s) recorded, first: {first}",
                output.diagnostics.len()
            );
        }
    }
    Ok(())
}

fn purge(settings: &QuireSettings, key: &str) -> Result<()> {
    let Some(cache) = open_backend(&settings.cache).context("Failed to open cache backend")? else {
        bail!("no cache backend configured");
    };
    let existed = cache
        .purge(key)
        .with_context(|| format!("Failed to purge cache key {key}"))?;
    info!(key, existed, "cache entry purged");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(quire_settings::settings_path);
    let mut settings = quire_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if cli.json_logs {
        settings.logging.json = true;
    }
    init_logging(&settings.logging);

    match cli.command {
        Command::Render(args) => render(&settings, args).await,
        Command::Modules => {
            for name in ModuleRegistry::with_builtins().names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Purge { key } => purge(&settings, &key),
    }
}
