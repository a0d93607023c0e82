//! HTTP router.
//!
//! Lifecycle routes are `PUT` and take the acting user from the
//! `X-Actor-Id` header. Path params use `:param` syntax (axum 0.7).

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::endpoints::{appointments, health, services, users};
use crate::state::AppState;

/// Build the API router with all routes and request tracing.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::check))
        .route(
            "/appointments",
            post(appointments::create).get(appointments::list),
        )
        .route("/appointments/:id", get(appointments::detail))
        .route("/appointments/:id/confirm", put(appointments::confirm))
        .route("/appointments/:id/checkin", put(appointments::check_in))
        .route("/appointments/:id/collect", put(appointments::collect_sample))
        .route("/appointments/:id/process", put(appointments::start_processing))
        .route("/appointments/:id/checkout", put(appointments::checkout))
        .route("/appointments/:id/cancel", put(appointments::cancel))
        .route("/appointments/:id/no-show", put(appointments::no_show))
        .route("/services", get(services::list))
        .route("/services/:id", get(services::detail))
        .route("/users", post(users::register))
        .route("/users/:id/patient-id", post(users::assign_patient_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use mdlab_core::{Database, IntakeConfig, PasswordHasher};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = Database::open_in_memory().unwrap();
        api_router(AppState::new(db, PasswordHasher::new(1_000), IntakeConfig::default()))
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let response = test_router()
            .oneshot(Request::get("/medications").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lifecycle_routes_reject_get() {
        let response = test_router()
            .oneshot(
                Request::get("/appointments/abc/checkin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn transition_without_actor_returns_401() {
        let response = test_router()
            .oneshot(
                Request::put("/appointments/abc/confirm")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_appointment_returns_404() {
        let response = test_router()
            .oneshot(Request::get("/appointments/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
