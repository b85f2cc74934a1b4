use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    /// `git` executable used for ref, config and object-database access.
    #[serde(default = "default_git_binary")]
    pub binary: String,
    /// Extra arguments appended to `git index-pack` when unbundling.
    #[serde(default)]
    pub index_pack_args: Vec<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            index_pack_args: Vec::new(),
        }
    }
}

fn default_git_binary() -> String {
    "git".to_string()
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Command line of the remote helper used for `http:`/`https:` URIs.
    ///
    /// The first word is the program; `origin <uri>` is appended to the
    /// rest.
    #[serde(default = "default_remote_helper")]
    pub remote_helper: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            remote_helper: default_remote_helper(),
        }
    }
}

fn default_remote_helper() -> Vec<String> {
    vec!["git-remote-https".to_string()]
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Parse and validate a YAML configuration document.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(!config.git.binary.trim().is_empty(), "git.binary must not be empty");
    anyhow::ensure!(
        config
            .transport
            .remote_helper
            .first()
            .is_some_and(|program| !program.trim().is_empty()),
        "transport.remote_helper must name a program"
    );
    EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("invalid logging.level: {:?}", config.logging.level))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
