//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use mfgraph_core::{GraphCache, QueryService, fetch_all};
use mfgraph_shared::{AppConfig, init_config, load_config, load_config_from};
use mfgraph_sources::{SourceAdapter, build_sources};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mfgraph: one queryable graph over ERP, MES and SCADA data.
#[derive(Parser)]
#[command(
    name = "mfgraph",
    version,
    about = "Merge manufacturing sources into one graph and build context around any entity.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.mfgraph/mfgraph.toml).
    #[arg(long, global = true, env = "MFGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the unified query API over HTTP.
    Serve {
        /// Listen address (overrides `[server] listen_addr`).
        #[arg(long)]
        listen: Option<String>,
    },

    /// Build the manufacturing context around one element.
    Context {
        /// Element id to start from.
        id: String,
    },

    /// Search instances by id, name, type or attribute value.
    Search {
        /// Case-insensitive search term.
        term: String,

        /// Only instances whose type id contains this text.
        #[arg(short = 't', long = "type")]
        type_filter: Option<String>,
    },

    /// Print the Line → Equipment → Sensor hierarchy.
    Hierarchy {
        /// Restrict to one line.
        #[arg(long)]
        line: Option<String>,
    },

    /// Fetch every source once and report what each returned.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mfgraph=info",
        1 => "mfgraph=debug,tower_http=debug",
        _ => "mfgraph=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { listen } => cmd_serve(config_path, listen.as_deref()).await,
        Command::Context { id } => {
            let service = warm_service(config_path).await?;
            print_json(&service.context(&id)?)
        }
        Command::Search { term, type_filter } => {
            let service = warm_service(config_path).await?;
            print_json(&service.search(&term, type_filter.as_deref())?)
        }
        Command::Hierarchy { line } => {
            let service = warm_service(config_path).await?;
            print_json(&service.hierarchy(line.as_deref())?)
        }
        Command::Sources => cmd_sources(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner shown while sources are fetched.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Build the cache from config and run the first rebuild behind a spinner.
async fn warm_service(config_path: Option<PathBuf>) -> Result<QueryService> {
    let config = resolve_config(config_path)?;
    let sources = build_sources(&config)?;
    let cache = GraphCache::new(sources, &config.cache);

    let progress = CliProgress::new(&format!("Fetching {} sources", config.sources.len()));
    let snapshot = cache.initialize().await;
    progress.finish();

    let snapshot = snapshot.wrap_err("no source could be reached")?;
    for report in cache.status().sources.iter().filter(|r| !r.errors.is_empty()) {
        for error in &report.errors {
            warn!(source = %report.name, kind = ?error.kind, "{}", error.message);
        }
    }
    info!(
        version = snapshot.version(),
        instances = snapshot.len(),
        edges = snapshot.edges().len(),
        "graph ready"
    );
    Ok(QueryService::new(cache, &config.cache))
}

async fn cmd_serve(config_path: Option<PathBuf>, listen: Option<&str>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(listen) = listen {
        config.server.listen_addr = listen.to_string();
    }
    let addr: SocketAddr = config.server.socket_addr()?;

    let sources = build_sources(&config)?;
    let cache = GraphCache::new(sources, &config.cache);
    // Serve even when every source is down; the cache retries on its own.
    if let Err(e) = cache.initialize().await {
        warn!(error = %e, "initial rebuild failed, serving an empty graph");
    }

    let service = QueryService::new(cache, &config.cache);
    mfgraph_api::serve(service, addr).await?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceSummary {
    name: String,
    reachable: bool,
    namespaces: usize,
    types: usize,
    instances: usize,
    relationships: usize,
    errors: Vec<String>,
}

async fn cmd_sources(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let sources: Vec<Arc<dyn SourceAdapter>> = build_sources(&config)?;

    let progress = CliProgress::new(&format!("Fetching {} sources", sources.len()));
    let outcomes = fetch_all(&sources, config.cache.fetch_timeout()).await;
    progress.finish();

    let summaries: Vec<SourceSummary> = outcomes
        .iter()
        .map(|o| SourceSummary {
            name: o.source.clone(),
            reachable: !o.is_unreachable(),
            namespaces: o.namespaces.len(),
            types: o.types.len(),
            instances: o.instances.len(),
            relationships: o.instances.iter().map(|i| i.relationship_count()).sum(),
            errors: o.errors.iter().map(ToString::to_string).collect(),
        })
        .collect();

    print_json(&summaries)?;
    if summaries.iter().all(|s| !s.reachable) {
        return Err(eyre!("no source could be reached"));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
