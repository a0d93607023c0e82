//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::{APP_NAME, APP_VERSION};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// `GET /health`: liveness plus a database round trip.
pub async fn check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let db = state.lock_db()?;
    db.conn()
        .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        name: APP_NAME,
        version: APP_VERSION,
    }))
}
