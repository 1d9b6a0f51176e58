//! procpeek - samples resource usage of named processes into a CSV log.

use anyhow::{Context, Result};
use clap::Parser;
use procpeek::{
    app::App,
    cli::{prompt_process_names, Cli},
    config::Config,
    shutdown::ShutdownSignal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let mut config = Config::load(&cli).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if config.processes.is_empty() {
        config.processes = prompt_process_names(std::io::stdin().lock(), std::io::stdout())
            .context("failed to read process names")?;
    }
    config.validate()?;

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Interval: {}s", config.interval_seconds);
    info!("Processes: {}", config.processes.join(", "));
    info!("Log Path: {}", config.log_path.display());
    info!("Persister Poll Interval: {}ms", config.persister.poll_interval_ms);
    if config.metrics.enabled {
        info!("Metrics: {}", config.metrics.listen_address);
    } else {
        info!("Metrics: Disabled");
    }
    info!("-------------------------------------------------------");

    let shutdown = ShutdownSignal::new();
    let app = App::builder(config).build(shutdown.clone()).await?;
    info!(
        "Monitoring started with run id {}. Type 'exit' to stop.",
        app.run_id()
    );

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received. Waiting for samplers to finish and the log to be flushed.");
                shutdown.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    app.run().await
}
