//! Appointment endpoints.
//!
//! - `POST /appointments`: intake
//! - `GET /appointments`: list, filtered by `status` and `patientId`
//! - `GET /appointments/:id`: detail
//! - `PUT /appointments/:id/<action>`: lifecycle transitions

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mdlab_core::{
    Action, Actor, Appointment, AppointmentFilter, AppointmentIntake, AppointmentLifecycle,
    AppointmentStatus,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Header naming the user performing a transition.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub appointment: Appointment,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    /// Internal user id of the patient
    pub patient_id: Option<String>,
}

/// Optional body for transitions; only `cancel` reads the reason.
#[derive(Debug, Default, Deserialize)]
pub struct TransitionBody {
    pub reason: Option<String>,
}

/// `POST /appointments`: validate, normalize and store a booking.
///
/// The body is taken as raw JSON so that type errors are reported per field
/// instead of as a deserialization failure.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let Json(request) = payload?;
    let submitted_by = actor_id(&headers);
    let db = state.lock_db()?;
    let identity = state.identity(&db);
    let appointment =
        AppointmentIntake::new(&db, &identity, state.intake).submit(&request, submitted_by)?;

    Ok((StatusCode::CREATED, Json(AppointmentResponse { appointment })))
}

/// `GET /appointments`: list appointments.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<AppointmentStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let filter = AppointmentFilter {
        status,
        patient_user_id: params.patient_id.filter(|id| !id.is_empty()),
        ..Default::default()
    };

    let db = state.lock_db()?;
    let appointments = db.list_appointments(&filter)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /appointments/:id`: appointment detail.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let db = state.lock_db()?;
    let appointment = db
        .get_appointment(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("appointment {}", id)))?;
    Ok(Json(AppointmentResponse { appointment }))
}

pub async fn confirm(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::Confirm, None)
}

pub async fn check_in(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::CheckIn, None)
}

pub async fn collect_sample(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::CollectSample, None)
}

pub async fn start_processing(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::StartProcessing, None)
}

/// `PUT /appointments/:id/checkout`: results released, appointment completed.
pub async fn checkout(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::Complete, None)
}

/// `PUT /appointments/:id/cancel`: body `{ "reason": "..." }` is optional.
pub async fn cancel(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
    body: Option<Json<TransitionBody>>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    transition(state, headers, id, Action::Cancel, reason.as_deref())
}

pub async fn no_show(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    transition(state, headers, id, Action::MarkNoShow, None)
}

fn transition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    action: Action,
    reason: Option<&str>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let actor_id = actor_id(&headers)
        .ok_or_else(|| ApiError::Unauthorized(format!("{} header is required", ACTOR_HEADER)))?;

    let db = state.lock_db()?;
    let actor = Actor::resolve(&state.identity(&db), actor_id)?;
    let appointment = AppointmentLifecycle::new(&db).transition(&id, action, &actor, reason)?;
    Ok(Json(AppointmentResponse { appointment }))
}

fn actor_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
