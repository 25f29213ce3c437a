//! The `steadfast watch` command: run the connectivity monitor until Ctrl-C,
//! printing each state change as a JSON line.

use clap::Args;
use steadfast_core::{Config, DeviceSignal};

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Override the configured ping interval
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Endpoints to probe instead of the configured ones
    #[arg(long = "endpoint")]
    pub endpoints: Vec<String>,
}

/// Execute the watch command.
pub async fn execute(args: WatchArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(interval) = args.interval_ms {
        config.connectivity.ping_interval_ms = interval;
    }
    if !args.endpoints.is_empty() {
        config.connectivity.endpoints = args.endpoints;
    }

    let notifier = super::notify::default_chain(None);
    let engine = super::build_engine(config, DeviceSignal::new(true), &notifier)?;
    let mut state = engine.monitor().subscribe();
    engine.start();
    tracing::info!(
        endpoints = engine.monitor().endpoints().len(),
        "Watching connectivity, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&snapshot)?);
                super::flush_undelivered(&notifier);
            }
        }
    }

    engine.shutdown();
    Ok(())
}
