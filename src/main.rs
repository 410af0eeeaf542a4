mod cli;
mod config;
mod downloader;
mod media;
mod output;
mod progress;
mod retry;

use config::Config;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{filter::Builder as TracingFilterBuilder, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    match dotenvy::dotenv() {
        Err(e) if e.not_found() => {}
        Ok(_) => {}
        Err(e) => {
            panic!("Failed to load .env file: {}", e);
        }
    }

    init_log();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("❌ Invalid configuration: {e:#}");
            return;
        }
    };

    if let Err(e) = cli::run(&config).await {
        warn!(?e, "Session ended with an error");
        println!("❌ Something went wrong: {e:#}");
    }
}

fn init_log() {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            TracingFilterBuilder::default()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish()
        .init();
}
