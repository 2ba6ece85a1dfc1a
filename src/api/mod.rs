mod base;
mod status;
mod ws;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod paths;
pub mod state;

use crate::error::Result;
use crate::settings::Settings;
use state::SharedState;

/// Build the full API: the voting socket plus the read-only monitoring
/// endpoints over the same shared state.
pub fn api(settings: &Settings) -> Result<(SharedState, Router)> {
    let shared = state::AppState::from_settings(settings)?;

    let api = Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        // Snapshot for first page load; same shape as socket broadcasts
        .route(paths::POLL, routing::get(status::poll))
        // The persistent voting connection
        .route(paths::WEBSOCKET, routing::get(ws::websocket))
        // Monitoring
        .route(
            paths::monitoring::RATE_LIMIT_STATUS,
            routing::get(status::rate_limit_status),
        )
        .route(
            paths::monitoring::ANOMALY_STATS,
            routing::get(status::anomaly_stats),
        )
        .route(
            paths::monitoring::ANOMALY_RECORDS,
            routing::get(status::anomaly_records),
        )
        .route(
            paths::monitoring::VOTE_HISTORY,
            routing::get(status::vote_history),
        )
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared.clone());

    Ok((shared, api))
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
