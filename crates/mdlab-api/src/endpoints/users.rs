//! Account endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use mdlab_core::{IdentityStore, NewUser, User};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdResponse {
    pub user_id: String,
    pub patient_id: String,
}

/// `POST /users`: register an account. Patients receive a patient ID.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(new) = payload?;
    let db = state.lock_db()?;
    let user = state.identity(&db).register_user(&new)?;
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// `POST /users/:id/patient-id`: assign a patient ID, or return the stored one.
pub async fn assign_patient_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PatientIdResponse>, ApiError> {
    let db = state.lock_db()?;
    let patient_id = state.identity(&db).assign_patient_id(&user_id)?;
    Ok(Json(PatientIdResponse { user_id, patient_id }))
}
