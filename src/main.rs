use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use sense_relay::config::AppConfig;
use sense_relay::logger;
use sense_relay::service::ServiceLifecycle;
use sense_relay::supervisor::{self, ExitReason, RestartPolicy};

#[derive(Parser, Debug)]
#[command(name = "sense-relay", about = "Samples the accelerometer and relays the latest reading over HTTP")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() {
    logger::init_logger();
    info!("Application starting");

    let args = Args::parse();
    match run(args).await {
        Ok(ExitReason::Shutdown) => info!("Application exiting"),
        Ok(ExitReason::GaveUp { restarts }) => {
            error!("Sensor kept failing after {} restarts, exiting", restarts);
            std::process::exit(2);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<ExitReason, Box<dyn std::error::Error>> {
    let config = AppConfig::load(args.config.as_deref())?;

    if args.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(ExitReason::Shutdown);
    }

    let service = ServiceLifecycle::from_config(&config)?;
    let policy = RestartPolicy::try_from(&config.supervisor)?;

    let reason = supervisor::supervise(&service, policy, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await?;

    let stats = service.stats();
    info!(
        "Deliveries: {} attempted, {} delivered, {} failed, {} ticks without data",
        stats.attempts, stats.delivered, stats.failed, stats.skipped
    );
    Ok(reason)
}
