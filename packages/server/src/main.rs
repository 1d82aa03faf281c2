#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime forecast API server binary.

use std::path::PathBuf;

use clap::Parser;
use crime_forecast_pipeline::config::ForecastConfig;

#[derive(Parser)]
#[command(name = "crime_forecast_server", about = "Serve crime risk forecasts")]
struct Cli {
    /// TOML config file (defaults to `CRIME_FORECAST_CONFIG`, then the
    /// built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prompt for bind address, port and static directory
    #[arg(short, long)]
    interactive: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();
    let config = ForecastConfig::load(cli.config.as_deref()).map_err(std::io::Error::other)?;

    if cli.interactive {
        crime_forecast_server::interactive::run(config).await
    } else {
        crime_forecast_server::run_server(config).await
    }
}
