//! The `steadfast call` command: a guarded, retried GET.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use steadfast_core::{Config, DeviceSignal, Notification, ResilientCaller};

/// Arguments for the `call` command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// URL to fetch
    pub url: String,

    /// Override the configured retry budget
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Override the configured initial backoff delay
    #[arg(long)]
    pub initial_delay_ms: Option<u64>,

    /// Disable backoff jitter
    #[arg(long)]
    pub no_jitter: bool,

    /// Call even if the health endpoints are unreachable
    #[arg(long)]
    pub skip_connectivity: bool,

    /// Treat the device as offline
    #[arg(long)]
    pub offline: bool,

    /// Pretty-print JSON responses
    #[arg(long)]
    pub pretty: bool,
}

impl CallArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(initial) = self.initial_delay_ms {
            config.retry.initial_delay_ms = initial;
            config.retry.max_delay_ms = config.retry.max_delay_ms.max(initial);
        }
        if self.no_jitter {
            config.retry.jitter = false;
        }
    }
}

/// Execute the call command.
pub async fn execute(args: CallArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);

    let spinner = create_spinner()?;
    let notifier = super::notify::default_chain(Some(spinner.clone()));
    let device = DeviceSignal::new(!args.offline);
    let engine = super::build_engine(config, device, &notifier)?;

    if !args.skip_connectivity {
        spinner.set_message("Checking connectivity...");
        engine.monitor().check_api_health().await;
    }

    let client = engine.client().clone();
    let url = args.url.clone();
    let retry_notifier = notifier.clone();
    let exhausted_notifier = notifier.clone();
    let executor = engine
        .executor(move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get_text(&url).await }
        })
        .on_retry(move |attempt, error| {
            retry_notifier.notify(Notification::warning(
                format!("Retry {attempt}"),
                error.to_string(),
            ));
        })
        .on_max_retries_reached(move |error| {
            exhausted_notifier.notify(Notification::error(
                "Maximum retry attempts reached",
                error.to_string(),
            ));
        });

    let caller = if args.skip_connectivity {
        ResilientCaller::unguarded(executor)
    } else {
        ResilientCaller::new(executor, engine.monitor().clone())
    };

    let mut state = caller.executor().subscribe();
    let progress = spinner.clone();
    let ticker = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let message = state.borrow_and_update().status_message();
            progress.set_message(message);
        }
    });

    let call = caller.call();
    tokio::pin!(call);
    let result = tokio::select! {
        result = &mut call => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling pending retry");
            caller.executor().cancel();
            call.await
        }
    };

    ticker.abort();
    spinner.finish_and_clear();
    super::flush_undelivered(&notifier);
    engine.shutdown();

    let body = result.with_context(|| {
        format!(
            "GET {} failed ({})",
            args.url,
            caller.executor().status_message()
        )
    })?;
    println!("{}", render_body(&body, args.pretty));
    Ok(())
}

fn render_body(body: &str, pretty: bool) -> String {
    if !pretty {
        return body.to_string();
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Spinner whose message tracks the executor's status line.
fn create_spinner() -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message("Connecting...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
