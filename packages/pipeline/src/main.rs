#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tool for training and inspecting crime forecast models.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crime_forecast_cli_utils::IndicatifProgress;
use crime_forecast_ingest::columns::{self, ResolvedColumn};
use crime_forecast_ingest::loader::read_header;
use crime_forecast_model::artifact::ModelArtifact;
use crime_forecast_pipeline::config::ForecastConfig;
use crime_forecast_pipeline::run;

#[derive(Parser)]
#[command(name = "crime_forecast_train", about = "Train and inspect crime forecast models")]
struct Cli {
    /// TOML config file (defaults to `CRIME_FORECAST_CONFIG`, then the
    /// built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the model artifact
    Train {
        /// Incident CSV (overrides `data_path`)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Artifact directory (overrides `model_dir`)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Cells per side (overrides `grid_size`)
        #[arg(long)]
        grid_size: Option<usize>,

        /// Days per window (overrides `window_length`)
        #[arg(long)]
        window_length: Option<usize>,
    },
    /// Print the metadata of an existing artifact
    Inspect {
        /// Artifact directory (overrides `model_dir`)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Print how the header of a CSV file resolves to incident fields
    Columns {
        /// File to inspect
        file: PathBuf,
    },
}

fn describe(column: Option<&ResolvedColumn>) -> String {
    column.map_or_else(
        || "(not found)".to_string(),
        |c| format!("\"{}\" (column {})", c.name, c.index),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_forecast_cli_utils::init_logger();
    let cli = Cli::parse();
    let mut config = ForecastConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            data,
            model_dir,
            grid_size,
            window_length,
        } => {
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(model_dir) = model_dir {
                config.model_dir = model_dir;
            }
            if let Some(grid_size) = grid_size {
                config.grid_size = grid_size;
            }
            if let Some(window_length) = window_length {
                config.window_length = window_length;
            }
            config.validate()?;

            let progress = IndicatifProgress::bytes_bar(
                &multi,
                &format!("Loading {}", config.data_path.display()),
            );
            let artifact = run::train_and_save(&config, &progress)?;

            println!(
                "Trained {}x{} model over {} day windows",
                artifact.model.grid_size(),
                artifact.model.grid_size(),
                artifact.model.window_length()
            );
            println!("Artifact written to {}", config.model_dir.display());
        }
        Commands::Inspect { model_dir } => {
            let dir = model_dir.unwrap_or(config.model_dir);
            let artifact = ModelArtifact::load(&dir)?;
            let b = artifact.metadata.bounds;
            let kind = if artifact.model.is_baseline() {
                "window-mean baseline"
            } else {
                "linear grid model"
            };

            println!("Model:    {kind}");
            println!(
                "Grid:     {}x{}",
                artifact.model.grid_size(),
                artifact.model.grid_size()
            );
            println!("Window:   {} day(s)", artifact.model.window_length());
            println!(
                "Bounds:   south={} west={} north={} east={}",
                b.south, b.west, b.north, b.east
            );
            println!(
                "Scaler:   mean={} std={}",
                artifact.metadata.scaler.mean, artifact.metadata.scaler.std
            );
            println!("{}", serde_json::to_string_pretty(&artifact.model)?);
        }
        Commands::Columns { file } => {
            let delimiter = u8::try_from(config.delimiter).unwrap_or(b',');
            let header = read_header(&file, delimiter)?;
            println!("Header: {}", header.join(", "));
            let mapping = columns::resolve(&header, &config.columns)?;
            println!("timestamp -> {}", describe(Some(&mapping.timestamp)));
            println!("lat       -> {}", describe(Some(&mapping.latitude)));
            println!("lng       -> {}", describe(Some(&mapping.longitude)));
            println!("category  -> {}", describe(mapping.category.as_ref()));
        }
    }

    Ok(())
}
