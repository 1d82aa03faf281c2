//! HTTP handler functions for the crime forecast API.

use std::convert::Infallible;
use std::str::FromStr as _;
use std::time::Duration;

use actix_web::web::Bytes;
use actix_web::{HttpResponse, web};
use crime_forecast_pipeline::PipelineError;
use crime_forecast_pipeline::serve;
use crime_forecast_server_models::{
    ApiError, ApiForecastCell, ApiForecastResponse, ApiHealth, ApiLiveIncident,
    ForecastQueryParams, Horizon,
};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;
use crate::live::REPLAY_COUNT;

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE: Duration = Duration::from_secs(25);

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/forecast`
///
/// Loads the current model (or the baseline), rebuilds the latest window
/// from the incident file and returns one risk score per grid cell.
pub async fn forecast(
    state: web::Data<AppState>,
    params: web::Query<ForecastQueryParams>,
) -> HttpResponse {
    let horizon = match params.horizon.as_deref() {
        None => Horizon::default(),
        Some(raw) => match Horizon::from_str(raw) {
            Ok(h) => h,
            Err(_) => {
                return bad_request(format!(
                    "Unknown horizon {raw:?}: expected day, week or month"
                ));
            }
        },
    };

    let config = state.config.clone();
    let grid = params.grid;
    let result = web::block(move || serve::forecast(&config, horizon.steps(), grid)).await;

    match result {
        Ok(Ok(forecast)) => {
            let result = forecast
                .cells
                .iter()
                .map(|c| ApiForecastCell {
                    i: c.cell.i,
                    j: c.cell.j,
                    risk: c.risk,
                    bounds: c.bounds,
                })
                .collect();
            HttpResponse::Ok().json(ApiForecastResponse {
                horizon,
                grid_size: forecast.grid_size,
                generated_at: chrono::Utc::now(),
                result,
            })
        }
        Ok(Err(e)) => pipeline_error(&e),
        Err(e) => {
            log::error!("Forecast task failed: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                error: "forecast_failed".to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// `GET /api/stream/incidents`
///
/// Server-sent events: replays recent incidents, then forwards new ones as
/// they are published, with a keep-alive comment while idle.
pub async fn stream_incidents(state: web::Data<AppState>) -> HttpResponse {
    let (replay, mut rx) = state.feed.subscribe_with_replay(REPLAY_COUNT);
    log::debug!("SSE client connected, replaying {} incident(s)", replay.len());

    let stream = async_stream::stream! {
        for incident in &replay {
            yield Ok::<_, Infallible>(incident_event(incident));
        }

        let mut keep_alive = tokio::time::interval(KEEP_ALIVE);
        // The first tick completes immediately.
        keep_alive.tick().await;

        loop {
            let next = tokio::select! {
                msg = rx.recv() => Some(msg),
                _ = keep_alive.tick() => None,
            };
            match next {
                Some(Ok(incident)) => yield Ok(incident_event(&incident)),
                Some(Err(RecvError::Lagged(skipped))) => {
                    log::warn!("SSE client lagged, skipped {skipped} incident(s)");
                }
                Some(Err(RecvError::Closed)) => break,
                None => yield Ok(Bytes::from_static(b": ping\n\n")),
            }
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

/// Formats one incident as an `incident` SSE event.
fn incident_event(incident: &ApiLiveIncident) -> Bytes {
    match serde_json::to_string(incident) {
        Ok(json) => Bytes::from(format!("event: incident\ndata: {json}\n\n")),
        Err(e) => {
            log::error!("Failed to serialize incident {}: {e}", incident.id);
            Bytes::new()
        }
    }
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError {
        error: "invalid_request".to_string(),
        message,
    })
}

/// Configuration errors are the caller's fault (400); the rest are ours.
fn pipeline_error(e: &PipelineError) -> HttpResponse {
    if e.is_configuration_error() {
        log::warn!("Rejected forecast request: {e}");
        return bad_request(e.to_string());
    }
    log::error!("Forecast failed: {e}");
    HttpResponse::InternalServerError().json(ApiError {
        error: "forecast_failed".to_string(),
        message: e.to_string(),
    })
}

/// JSON body for query strings that do not deserialize (e.g. `grid=abc`).
pub fn query_error(
    err: actix_web::error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    let message = err.to_string();
    actix_web::error::InternalError::from_response(err, bad_request(message)).into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use crime_forecast_pipeline::config::ForecastConfig;
    use crime_forecast_server_models::LiveIncidentType;

    use super::*;
    use crate::live::LiveFeed;

    fn isolated_state() -> web::Data<AppState> {
        let tmp = std::env::temp_dir();
        let id = uuid::Uuid::new_v4();
        web::Data::new(AppState {
            config: Arc::new(ForecastConfig {
                grid_size: 3,
                window_length: 2,
                data_path: tmp.join(format!("crime_forecast_missing_{id}.csv")),
                model_dir: tmp.join(format!("crime_forecast_missing_models_{id}")),
                ..ForecastConfig::default()
            }),
            feed: Arc::new(LiveFeed::new()),
        })
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(body.healthy);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn forecast_serves_baseline_without_model() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get()
            .uri("/api/forecast?horizon=week&grid=3")
            .to_request();
        let body: ApiForecastResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.horizon, Horizon::Week);
        assert_eq!(body.grid_size, 3);
        assert_eq!(body.result.len(), 9);
        assert_eq!((body.result[5].i, body.result[5].j), (1, 2));
        let defaults = ForecastConfig::default().default_bounds;
        assert!((body.result[8].bounds.north - defaults.north).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn grid_size_mismatch_is_bad_request() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get()
            .uri("/api/forecast?grid=50")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_request");
        assert!(body.message.contains("mismatch"), "{}", body.message);
    }

    #[actix_web::test]
    async fn unknown_horizon_is_bad_request() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get()
            .uri("/api/forecast?horizon=year")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ApiError = test::read_body_json(resp).await;
        assert!(body.message.contains("year"));
    }

    #[actix_web::test]
    async fn malformed_grid_is_json_bad_request() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get()
            .uri("/api/forecast?grid=abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_request");
    }

    #[actix_web::test]
    async fn incident_stream_is_event_stream() {
        let app = test::init_service(App::new().configure(crate::api(isolated_state()))).await;
        let req = test::TestRequest::get()
            .uri("/api/stream/incidents")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
    }

    #[::core::prelude::v1::test]
    fn incident_event_is_framed() {
        let incident = ApiLiveIncident {
            id: "x1".to_string(),
            incident_type: LiveIncidentType::Robbery,
            occurred_at: chrono::Utc::now(),
            lat: 1.0,
            lng: 2.0,
        };
        let bytes = incident_event(&incident);
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("event: incident\ndata: {"));
        assert!(text.contains("\"type\":\"ROBBERY\""));
        assert!(text.ends_with("\n\n"));
    }
}
