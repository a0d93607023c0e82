//! End-to-end HTTP tests against an in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use mdlab_api::{api_router, AppState};
use mdlab_core::{Database, IntakeConfig, PasswordHasher, PricePolicy, Service, ServiceCategory};

struct TestApi {
    router: Router,
    service: Service,
}

fn setup_with(config: IntakeConfig) -> TestApi {
    let db = Database::open_in_memory().unwrap();
    let service = Service::new("Complete Blood Count".into(), ServiceCategory::Hematology, 100.0);
    db.upsert_service(&service).unwrap();
    let mut inactive = Service::new("Retired Panel".into(), ServiceCategory::Chemistry, 50.0);
    inactive.is_active = false;
    db.upsert_service(&inactive).unwrap();

    TestApi {
        router: api_router(AppState::new(db, PasswordHasher::new(1_000), config)),
        service,
    }
}

fn setup() -> TestApi {
    setup_with(IntakeConfig::default())
}

fn jasmine(service_id: &str) -> Value {
    json!({
        "patientName": "jasmine",
        "contactNumber": "09496858361",
        "email": "renz09358@gmail.com",
        "age": 22,
        "sex": "Female",
        "serviceIds": [service_id],
        "serviceName": "CBC",
        "appointmentDate": "2025-10-13",
        "appointmentTime": "10:00",
        "totalPrice": 100
    })
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request.header("X-Actor-Id", actor);
    }
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(router: &Router, username: &str, role: &str) -> Value {
    let (status, json) = send(
        router,
        "POST",
        "/users",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@mdlab.ph", username),
            "password": "secret1",
            "role": role
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, json);
    json["user"].clone()
}

fn error_paths(json: &Value) -> Vec<String> {
    json["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["path"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn jasmine_booking_is_created_as_scheduled() {
    let api = setup();
    let (status, json) = send(
        &api.router,
        "POST",
        "/appointments",
        None,
        Some(jasmine(&api.service.id)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", json);
    let appointment = &json["appointment"];
    assert_eq!(appointment["status"], "scheduled");
    assert_eq!(appointment["totalPrice"], 100.0);
    assert!(appointment["appointmentCode"]
        .as_str()
        .unwrap()
        .starts_with("APT-"));

    let id = appointment["id"].as_str().unwrap();
    let (status, detail) = send(&api.router, "GET", &format!("/appointments/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["appointment"]["id"], id);
}

#[tokio::test]
async fn missing_service_name_returns_400_naming_the_field() {
    let api = setup();
    let mut body = jasmine(&api.service.id);
    body.as_object_mut().unwrap().remove("serviceName");

    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_paths(&json), vec!["serviceName"]);
    assert_eq!(json["errors"][0]["param"], "serviceName");
}

#[tokio::test]
async fn all_field_errors_are_reported_together() {
    let api = setup();
    let mut body = jasmine(&api.service.id);
    body["age"] = json!(150);
    body["contactNumber"] = json!("12345");

    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let paths = error_paths(&json);
    assert!(paths.contains(&"age".to_string()));
    assert_eq!(paths.iter().filter(|p| *p == "contactNumber").count(), 1);
}

#[tokio::test]
async fn inactive_service_is_reported_at_its_index() {
    let api = setup();
    let (_, listed) = send(&api.router, "GET", "/services?activeOnly=false", None, None).await;
    let retired = listed["services"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["isActive"] == false)
        .unwrap()["id"]
        .clone();

    let mut body = jasmine(&api.service.id);
    body["serviceIds"] = json!([api.service.id, retired]);
    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["path"], "serviceIds[1]");
    assert_eq!(json["errors"][0]["value"], retired);
}

#[tokio::test]
async fn enforced_price_rejects_a_mismatched_total() {
    let api = setup();
    let mut body = jasmine(&api.service.id);
    body["totalPrice"] = json!(1);

    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_paths(&json), vec!["totalPrice"]);
}

#[tokio::test]
async fn trusted_price_keeps_the_client_total() {
    let api = setup_with(IntakeConfig {
        price_policy: PricePolicy::ClientTrusted,
    });
    let mut body = jasmine(&api.service.id);
    body["totalPrice"] = json!(80);

    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(json["appointment"]["totalPrice"], 80.0);
}

#[tokio::test]
async fn unknown_patient_id_is_a_field_error() {
    let api = setup();
    let mut body = jasmine(&api.service.id);
    body["patientId"] = json!("no-such-user");

    let (status, json) = send(&api.router, "POST", "/appointments", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_paths(&json), vec!["patientId"]);
}

#[tokio::test]
async fn lifecycle_over_http() {
    let api = setup();
    let receptionist = register(&api.router, "front", "receptionist").await;
    let medtech = register(&api.router, "medtech", "medtech").await;
    let patient = register(&api.router, "jasmine", "patient").await;
    let front_id = receptionist["id"].as_str().unwrap();
    let medtech_id = medtech["id"].as_str().unwrap();
    let patient_id = patient["id"].as_str().unwrap();
    assert!(patient["patientId"].as_str().unwrap().starts_with('P'));
    assert!(patient.get("passwordHash").is_none());

    let (_, created) = send(
        &api.router,
        "POST",
        "/appointments",
        Some(front_id),
        Some(jasmine(&api.service.id)),
    )
    .await;
    let id = created["appointment"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["appointment"]["submittedBy"], front_id);
    let path = |action: &str| format!("/appointments/{}/{}", id, action);

    // Already scheduled: confirm is out of order
    let (status, _) = send(&api.router, "PUT", &path("confirm"), Some(front_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Patients cannot check in
    let (status, json) = send(&api.router, "PUT", &path("checkin"), Some(patient_id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let (status, _) = send(&api.router, "PUT", &path("checkin"), Some(front_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&api.router, "PUT", &path("collect"), Some(medtech_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&api.router, "PUT", &path("process"), Some(medtech_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = send(&api.router, "PUT", &path("checkout"), Some(medtech_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointment"]["status"], "completed");
    assert!(json["appointment"]["completedAt"].is_string());

    // Terminal
    let (status, _) = send(&api.router, "PUT", &path("cancel"), Some(front_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(&api.router, "GET", "/appointments?status=completed", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_records_the_reason() {
    let api = setup();
    let receptionist = register(&api.router, "front", "receptionist").await;
    let front_id = receptionist["id"].as_str().unwrap();

    let (_, created) = send(&api.router, "POST", "/appointments", None, Some(jasmine(&api.service.id))).await;
    let id = created["appointment"]["id"].as_str().unwrap();

    let (status, json) = send(
        &api.router,
        "PUT",
        &format!("/appointments/{}/cancel", id),
        Some(front_id),
        Some(json!({ "reason": "  patient rescheduled  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["appointment"]["status"], "cancelled");
    assert_eq!(json["appointment"]["cancellationReason"], "patient rescheduled");
}

#[tokio::test]
async fn transition_on_unknown_appointment_returns_404() {
    let api = setup();
    let receptionist = register(&api.router, "front", "receptionist").await;
    let (status, _) = send(
        &api.router,
        "PUT",
        "/appointments/does-not-exist/no-show",
        receptionist["id"].as_str(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_actor_returns_401() {
    let api = setup();
    let (_, created) = send(&api.router, "POST", "/appointments", None, Some(jasmine(&api.service.id))).await;
    let id = created["appointment"]["id"].as_str().unwrap();

    let (status, _) = send(
        &api.router,
        "PUT",
        &format!("/appointments/{}/checkin", id),
        Some("ghost"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_returns_409() {
    let api = setup();
    register(&api.router, "front", "receptionist").await;
    let (status, json) = send(
        &api.router,
        "POST",
        "/users",
        None,
        Some(json!({
            "username": "front",
            "email": "other@mdlab.ph",
            "password": "secret1",
            "role": "receptionist"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn patient_id_assignment_is_idempotent() {
    let api = setup();
    let patient = register(&api.router, "jasmine", "patient").await;
    let uri = format!("/users/{}/patient-id", patient["id"].as_str().unwrap());

    let (status, first) = send(&api.router, "POST", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["patientId"], patient["patientId"]);

    let (_, second) = send(&api.router, "POST", &uri, None, None).await;
    assert_eq!(first, second);

    let (status, _) = send(&api.router, "POST", "/users/nobody/patient-id", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn service_search_and_detail() {
    let api = setup();
    let (status, json) = send(&api.router, "GET", "/services?q=blood", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["services"][0]["name"], "Complete Blood Count");

    let (_, json) = send(&api.router, "GET", "/services", None, None).await;
    assert_eq!(json["services"].as_array().unwrap().len(), 1);

    let (status, json) = send(&api.router, "GET", &format!("/services/{}", api.service.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["service"]["price"], 100.0);

    let (status, _) = send(&api.router, "GET", "/services/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_status_filter_returns_400() {
    let api = setup();
    let (status, json) = send(&api.router, "GET", "/appointments?status=done", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_body_is_reported_on_body_field() {
    let api = setup();
    for (content_type, body) in [
        ("application/json", "{\"patientName\": "),
        ("text/plain", "patientName=jasmine"),
    ] {
        let request = Request::post("/appointments")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let response = api.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", content_type);

        let bytes = to_bytes(response.into_body(), 1 << 16).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error_paths(&json), vec!["body"]);
    }
}
