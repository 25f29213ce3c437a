//! Steadfast CLI - resilient HTTP calls with retries, a circuit breaker and
//! connectivity monitoring.
//!
//! # Usage
//!
//! ```bash
//! # Fetch a URL, retrying transient failures with a live countdown
//! steadfast call https://huggingface.co/api/models?limit=1 --pretty
//!
//! # One-shot health check of the configured endpoints
//! steadfast probe
//!
//! # Stream connectivity state changes until Ctrl-C
//! steadfast watch --interval-ms 5000
//!
//! # View configuration and where it came from
//! steadfast config show
//! steadfast config validate
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Steadfast - resilient calls against flaky HTTP services.
#[derive(Parser, Debug)]
#[command(name = "steadfast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// GET a URL through the retry executor and circuit breaker
    Call(cli::call::CallArgs),

    /// Probe the health endpoints once and print the connectivity state
    Probe(cli::probe::ProbeArgs),

    /// Run the connectivity monitor and print state changes
    Watch(cli::watch::WatchArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln
    let path = cli::config::config_path(None);
    let (config, source) = cli::config::load_effective(&path);
    if let cli::config::Source::Rejected(e) = source {
        eprintln!(
            "Warning: Failed to load config: {e}\n  \
             Using default configuration. Check your config file with `steadfast config validate`."
        );
    }
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Steadfast v{}", steadfast_core::VERSION);

    match cli.command {
        Commands::Call(args) => cli::call::execute(args, config).await,
        Commands::Probe(args) => cli::probe::execute(args, config).await,
        Commands::Watch(args) => cli::watch::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_call_with_overrides() {
        let cli = Cli::try_parse_from([
            "steadfast",
            "-v",
            "call",
            "https://example.com",
            "--max-retries",
            "5",
            "--offline",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Call(args) => {
                assert_eq!(args.url, "https://example.com");
                assert_eq!(args.max_retries, Some(5));
                assert!(args.offline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_probe_endpoints() {
        let cli = Cli::try_parse_from(["steadfast", "probe", "https://a.example", "https://b.example"])
            .unwrap();
        match cli.command {
            Commands::Probe(args) => assert_eq!(args.endpoints.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_file_override() {
        let cli = Cli::try_parse_from([
            "steadfast",
            "config",
            "show",
            "--json",
            "--file",
            "/tmp/steadfast.toml",
        ])
        .unwrap();
        match cli.command {
            Commands::Config(args) => {
                assert_eq!(args.file, Some("/tmp/steadfast.toml".into()));
                assert!(matches!(
                    args.command,
                    cli::config::ConfigCommand::Show { json: true }
                ));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
