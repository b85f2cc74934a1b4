use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use bundle_uri_fetch::bundleuri::{fetch_bundle_uri, parse_bundle_list, BundleList};
use bundle_uri_fetch::config::{self, Config, LoggingConfig};
use bundle_uri_fetch::{Repository, SchemeTransport};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "bundle-uri-fetch",
    about = "Bootstrap a Git repository from bundle URIs"
)]
struct Cli {
    /// Path to a YAML configuration file.  Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download one bundle and expose its branches under refs/bundles/.
    Fetch {
        /// Repository to unbundle into (work tree or bare).
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,
        /// Bundle location: http(s) URL, file:// URL, or local path.
        uri: String,
    },
    /// Parse a bundle-list document and print the normalized list.
    List {
        /// Bundle-list file in Git config format.
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let fmt_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run_fetch(config: &Config, repo: PathBuf, uri: String) -> Result<()> {
    let repo = Repository::open(&config.git.binary, &repo)
        .await?
        .with_index_pack_args(config.git.index_pack_args.clone());
    let transport = SchemeTransport::from_config(&config.transport);

    let summary = fetch_bundle_uri(&repo, &transport, &uri)
        .await
        .with_context(|| format!("failed to fetch bundle from {uri}"))?;

    for translated in &summary.translated {
        println!("{} {}", translated.oid, translated.name);
    }
    Ok(())
}

fn run_list(file: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read bundle list: {}", file.display()))?;

    let mut list = BundleList::new();
    let unrecognized = parse_bundle_list(&content, &mut list)
        .with_context(|| format!("failed to parse bundle list: {}", file.display()))?;

    for key in &unrecognized {
        tracing::warn!(key = %key.key, reason = key.reason, "ignoring bundle-list key");
    }

    print!("{list}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    init_tracing(&config.logging);
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Command::Fetch { repo, uri } => run_fetch(&config, repo, uri).await,
        Command::List { file } => run_list(file),
    }
}
