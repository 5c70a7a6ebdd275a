use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use sense_relay::config::AppConfig;
use sense_relay::{collector, logger};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Stub endpoint that logs posted accelerometer readings")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides [collector].bind_addr
    #[arg(long)]
    bind: Option<String>,

    /// Log file, overrides [collector].log_file
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() {
    logger::init_logger();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Collector failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(args.config.as_deref())?.collector;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = log_file;
    }

    collector::serve(&config, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, shutting down collector");
    })
    .await?;

    Ok(())
}
