//! Read-only monitoring endpoints over the vote core
use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{event, Level};

use super::state::SharedState;
use crate::detector::{AnomalyRecord, ClientHistorySummary, DetectorStats};
use crate::limiter::LimiterStatus;
use crate::poll::Poll;

const DEFAULT_RECORDS_LIMIT: usize = 20;

/// Current poll snapshot, same shape the socket broadcasts carry.
pub async fn poll(State(state): State<SharedState>) -> Result<axum::Json<Poll>, StatusCode> {
    match state.core.lock() {
        Ok(core) => Ok(axum::Json(core.ledger.snapshot())),
        Err(err) => {
            event!(Level::ERROR, message = "Failed to lock vote core", err = format!("{:?}", err));
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub async fn rate_limit_status(
    State(state): State<SharedState>,
) -> Result<axum::Json<LimiterStatus>, StatusCode> {
    match state.core.lock() {
        Ok(core) => Ok(axum::Json(core.limiter.status())),
        Err(err) => {
            event!(Level::ERROR, message = "Failed to lock vote core", err = format!("{:?}", err));
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub async fn anomaly_stats(
    State(state): State<SharedState>,
) -> Result<axum::Json<DetectorStats>, StatusCode> {
    match state.core.lock() {
        Ok(core) => Ok(axum::Json(core.detector.stats())),
        Err(err) => {
            event!(Level::ERROR, message = "Failed to lock vote core", err = format!("{:?}", err));
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Deserialize)]
pub struct RecordsParams {
    limit: Option<usize>,
}

pub async fn anomaly_records(
    Query(params): Query<RecordsParams>,
    State(state): State<SharedState>,
) -> Result<axum::Json<Vec<AnomalyRecord>>, StatusCode> {
    let limit = params.limit.unwrap_or(DEFAULT_RECORDS_LIMIT);
    match state.core.lock() {
        Ok(core) => Ok(axum::Json(core.detector.recent_records(limit))),
        Err(err) => {
            event!(Level::ERROR, message = "Failed to lock vote core", err = format!("{:?}", err));
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub async fn vote_history(
    State(state): State<SharedState>,
) -> Result<axum::Json<Vec<ClientHistorySummary>>, StatusCode> {
    match state.core.lock() {
        Ok(core) => Ok(axum::Json(core.detector.client_histories())),
        Err(err) => {
            event!(Level::ERROR, message = "Failed to lock vote core", err = format!("{:?}", err));
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
