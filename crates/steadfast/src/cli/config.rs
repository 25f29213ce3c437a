//! The `steadfast config` command: inspect, validate and create the config
//! file that the other commands load at startup.

use anyhow::Context;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use steadfast_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file to operate on instead of $STEADFAST_CONFIG or the
    /// platform default
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the configuration commands would run with, and where it came from
    Show {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Print the config file path and whether it exists
    Path,

    /// Write a config file with the default retry and connectivity settings
    Init {
        /// Overwrite an existing config file (the old one is kept as .bak)
        #[arg(long)]
        force: bool,
    },

    /// Check that the config file parses and passes range checks
    Validate,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File,
    /// No file at the path
    Defaults,
    /// The file exists but could not be used; startup falls back to defaults
    Rejected(String),
}

impl Source {
    fn describe(&self, path: &Path) -> String {
        match self {
            Source::File => format!("loaded from {}", path.display()),
            Source::Defaults => format!("built-in defaults ({} not found)", path.display()),
            Source::Rejected(e) => {
                format!("built-in defaults ({} rejected: {e})", path.display())
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Source::File => "file",
            Source::Defaults => "defaults",
            Source::Rejected(_) => "rejected",
        }
    }
}

/// `explicit`, else `$STEADFAST_CONFIG`, else the platform default.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("STEADFAST_CONFIG").map(PathBuf::from))
        .unwrap_or_else(Config::default_path)
}

/// Resolve the configuration the way startup does, remembering why.
pub fn load_effective(path: &Path) -> (Config, Source) {
    if !path.exists() {
        return (Config::default(), Source::Defaults);
    }
    match Config::load_from(path) {
        Ok(config) => (config, Source::File),
        Err(e) => (Config::default(), Source::Rejected(e.to_string())),
    }
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    let path = config_path(args.file);
    match args.command {
        ConfigCommand::Show { json } => {
            let (config, source) = load_effective(&path);
            print!("{}", render_show(&config, &path, &source, json)?);
        }

        ConfigCommand::Path => {
            let status = if path.exists() { "exists" } else { "not created" };
            println!("{} ({status})", path.display());
        }

        ConfigCommand::Init { force } => {
            init_at(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Validate => {
            let config = validate_at(&path)?;
            println!("{} is valid", path.display());
            println!(
                "  retries: {} (circuit opens after {} failures)",
                config.retry.max_retries, config.retry.circuit_breaker_threshold
            );
            println!("  health endpoints: {}", config.connectivity.endpoints.len());
        }
    }

    Ok(())
}

/// TOML with a provenance comment, or a JSON document carrying the same.
pub fn render_show(
    config: &Config,
    path: &Path,
    source: &Source,
    json: bool,
) -> anyhow::Result<String> {
    if json {
        let doc = serde_json::json!({
            "path": path,
            "source": source.label(),
            "config": config,
        });
        return Ok(format!("{}\n", serde_json::to_string_pretty(&doc)?));
    }
    Ok(format!(
        "# Effective configuration: {}\n\n{}",
        source.describe(path),
        config.to_toml()?
    ))
}

/// Write the default configuration to `path`.
///
/// The file is staged next to the target and loaded back before it replaces
/// anything, so a failed init never leaves an unreadable config behind.
pub fn init_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let staged = path.with_extension("toml.new");
    std::fs::write(&staged, Config::default().to_toml()?)?;
    if let Err(e) = Config::load_from(&staged) {
        let _ = std::fs::remove_file(&staged);
        return Err(e).context("Generated configuration failed validation");
    }

    if path.exists() {
        let backup = path.with_extension("toml.bak");
        std::fs::copy(path, &backup)
            .with_context(|| format!("Failed to back up {}", path.display()))?;
        tracing::debug!("Previous config saved to {}", backup.display());
    }
    std::fs::rename(&staged, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load `path` strictly: a missing or invalid file is an error.
pub fn validate_at(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "No config file at {}\nRun `steadfast config init` to create one.",
            path.display()
        );
    }
    Config::load_from(path).with_context(|| format!("Invalid config file {}", path.display()))
}
