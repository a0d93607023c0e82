//! Service catalog endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use mdlab_core::Service;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<Service>,
}

#[derive(Serialize)]
pub struct ServiceResponse {
    pub service: Service,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParams {
    pub q: Option<String>,
    #[serde(default = "default_active_only")]
    pub active_only: bool,
    pub limit: Option<usize>,
}

fn default_active_only() -> bool {
    true
}

/// `GET /services`: list the catalog, or search it when `q` is given.
///
/// Search only ever returns active services.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ServiceParams>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let db = state.lock_db()?;
    let services = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => db.search_services(query, params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?,
        None => {
            let mut services = db.list_services(params.active_only)?;
            if let Some(limit) = params.limit {
                services.truncate(limit);
            }
            services
        }
    };
    Ok(Json(ServicesResponse { services }))
}

/// `GET /services/:id`: service detail, inactive services included.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let db = state.lock_db()?;
    let service = db
        .get_service(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("service {}", id)))?;
    Ok(Json(ServiceResponse { service }))
}
