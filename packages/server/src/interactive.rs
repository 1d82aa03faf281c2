//! Interactive mode for the server.
//!
//! Prompts for bind address, port and static directory before starting the
//! server.

use crime_forecast_pipeline::config::ForecastConfig;
use dialoguer::{Confirm, Input};

/// Runs the server in interactive mode, prompting for configuration.
///
/// Asks for a bind address, port and static directory, sets the
/// corresponding environment variables (`BIND_ADDR`, `PORT`, `STATIC_DIR`),
/// and delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run(config: ForecastConfig) -> std::io::Result<()> {
    println!("Crime Forecast Server");
    println!();
    println!("Model directory: {}", config.model_dir.display());
    println!("Incident data:   {}", config.data_path.display());
    println!();

    let prompt = |label: &str, default: &str| -> String {
        Input::new()
            .with_prompt(label)
            .default(default.to_string())
            .interact_text()
            .unwrap_or_else(|_| default.to_string())
    };

    let bind_addr = prompt("Bind address", "127.0.0.1");
    let port = prompt("Port", "5050");
    let static_dir = prompt("Static directory", "frontend");

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port);
        std::env::set_var("STATIC_DIR", &static_dir);
    }

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server(config).await
}
