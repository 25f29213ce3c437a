//! The `steadfast probe` command: one health check, state as JSON on stdout.

use clap::Args;
use serde::Serialize;
use steadfast_core::{Config, ConnectionQuality, ConnectivityState, DeviceSignal};

/// Arguments for the `probe` command.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Endpoints to probe instead of the configured ones
    pub endpoints: Vec<String>,

    /// Device connection hint, e.g. "wifi" or "3g"
    #[arg(long)]
    pub connection: Option<String>,

    /// Treat the device as offline
    #[arg(long)]
    pub offline: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    endpoints: &'a [String],
    fully_online: bool,
    quality: ConnectionQuality,
    state: ConnectivityState,
}

/// Execute the probe command.
pub async fn execute(args: ProbeArgs, mut config: Config) -> anyhow::Result<()> {
    if !args.endpoints.is_empty() {
        config.connectivity.endpoints = args.endpoints.clone();
    }

    let device = DeviceSignal::new(!args.offline);
    device.set_connection_hint(args.connection.clone());
    let notifier = super::notify::default_chain(None);
    let engine = super::build_engine(config, device, &notifier)?;

    let monitor = engine.monitor();
    let healthy = monitor.check_api_health().await;
    let report = ProbeReport {
        endpoints: monitor.endpoints(),
        fully_online: monitor.is_fully_online(),
        quality: monitor.connection_quality(),
        state: monitor.state(),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    super::flush_undelivered(&notifier);
    engine.shutdown();

    if !healthy {
        anyhow::bail!(
            "API unreachable: none of {} endpoint(s) answered",
            report.endpoints.len()
        );
    }
    Ok(())
}
