#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for crime risk forecasts.
//!
//! Serves per-cell risk forecasts from the persisted model (or a baseline
//! when none has been trained yet), an SSE stream of mock live incidents,
//! and the static frontend.

mod handlers;
pub mod interactive;
pub mod live;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use crime_forecast_pipeline::config::ForecastConfig;

use crate::live::LiveFeed;

/// Shared application state.
pub struct AppState {
    /// Pipeline configuration (model directory, data file, grid shape).
    pub config: Arc<ForecastConfig>,
    /// Mock live-incident feed.
    pub feed: Arc<LiveFeed>,
}

/// Registers the `/api` routes against `state`.
pub fn api(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(state)
            .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/forecast", web::get().to(handlers::forecast))
                    .route(
                        "/stream/incidents",
                        web::get().to(handlers::stream_incidents),
                    ),
            );
    }
}

/// Starts the crime forecast API server.
///
/// Spawns the mock incident generator inside `config.default_bounds` and
/// serves the API plus the static frontend from `STATIC_DIR` (default
/// `frontend`). Binds to `BIND_ADDR` (default `127.0.0.1`) and `PORT`
/// (default `5050`). The caller provides the async runtime and
/// initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ForecastConfig) -> std::io::Result<()> {
    let feed = Arc::new(LiveFeed::new());
    live::spawn_generator(feed.clone(), config.default_bounds);

    let state = web::Data::new(AppState {
        config: Arc::new(config),
        feed,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5050);
    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "frontend".to_string());

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(api(state.clone()))
            // Serve frontend static files
            .service(Files::new("/", &static_dir).index_file("index.html"))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
