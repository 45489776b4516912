// src/main.rs - Actuator host: drives one actuator from a fixed-rate frame loop
use std::path::PathBuf;
use std::sync::Arc;

use actuator_rs::config::{self, Config};
use actuator_rs::hardware::simulated::SimulatedLink;
use actuator_rs::host::run_render_loop;
use actuator_rs::motion::{MotionController, OscillationPolicy};
use actuator_rs::scheduler::time_interface::{TimeInterface, TokioTime};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Actuator host CLI
#[derive(Parser, Debug)]
#[command(name = "actuator-host", about = "Drive a linear actuator with a back-and-forth stroke pattern.")]
struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many frames instead of running until Ctrl-C
    #[arg(long)]
    frames: Option<u64>,

    /// Override the simulated link's number of refused connect attempts
    #[arg(long)]
    fail_attempts: Option<u32>,

    /// Seed for the stroke pattern
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    tracing::info!("Starting actuator host");

    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(&path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };
    if let Some(failures) = cli.fail_attempts {
        config.simulator.connect_failures = failures;
    }

    tracing::info!("Endpoint: {}", config.controller.endpoint);
    tracing::info!("Retry delay: {:?}", config.controller.retry_delay());
    tracing::info!("Frame rate: {} Hz", config.host.frame_rate);

    let link = SimulatedLink::new(config.simulator.connect_failures)
        .with_latency(config.simulator.connect_latency())
        .with_command_logging(config.simulator.log_commands);
    let time: Arc<dyn TimeInterface> = Arc::new(TokioTime);
    let mut controller = MotionController::with_time(link, &config.controller, Arc::clone(&time));

    let policy = OscillationPolicy::new(config.oscillation.clone())?;
    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    policy.attach(&mut controller, rng);
    controller.on_connected(|c| {
        tracing::info!("Actuator connected at position {:.3}", c.current_position());
    });

    controller.connect();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let summary = run_render_loop(&mut controller, &config.host, time, cli.frames, shutdown).await;

    controller.cancel_connect();
    tracing::info!(
        "Ran {} frames, final position {:.3}, state {:?}, {} connect attempt(s)",
        summary.frames,
        summary.final_position,
        summary.state,
        summary.connect_attempts
    );
    Ok(())
}
