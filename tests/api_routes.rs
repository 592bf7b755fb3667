use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use campus_rides::{
    build_router,
    models::{Identity, Role},
    services::StaticIdentityProvider,
    AppConfig, AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let identity = StaticIdentityProvider::new()
        .with_token("student-token", Identity::new("student-1", Role::Student))
        .with_token("other-token", Identity::new("student-2", Role::Student))
        .with_token("ops-token", Identity::new("ops-1", Role::Operator));
    let state = AppState::in_memory(AppConfig::default(), Arc::new(identity));
    build_router(Arc::new(state))
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn ride_body() -> Value {
    json!({
        "pickup": { "lat": -23.8962, "lng": 29.4473, "address": "University of Limpopo" },
        "dropoff": { "lat": -23.8803, "lng": 29.7385 },
        "split_fare": { "total_participants": 2 }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn public_rides_need_no_credentials() {
    let uri = "/rides/public?pickup_lat=-23.8962&pickup_lng=29.4473&dropoff_lat=-23.8803&dropoff_lng=29.7385";
    let (status, body) = call(&app(), Method::GET, uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn submission_requires_a_known_token() {
    let app = app();
    let (status, _) = call(&app, Method::POST, "/rides", None, Some(ride_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::POST, "/rides", Some("forged"), Some(ride_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn ride_lifecycle_over_http() {
    let app = app();

    let (status, ride) = call(&app, Method::POST, "/rides", Some("student-token"), Some(ride_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ride["status"], "pending");
    assert_eq!(ride["estimate_source"], "fallback");
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, mine) = call(&app, Method::GET, "/rides/mine", Some("student-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, joined) = call(
        &app,
        Method::POST,
        &format!("/rides/{}/participants", ride_id),
        Some("other-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["split_fare"]["is_open"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/rides/{}/rating", ride_id),
        Some("student-token"),
        Some(json!({ "rating": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_completed");

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/rides/{}/status", ride_id),
        Some("student-token"),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_permissions");

    let (status, cancelled) = call(
        &app,
        Method::PUT,
        &format!("/rides/{}/status", ride_id),
        Some("student-token"),
        Some(json!({ "status": "cancelled", "reason": "plans changed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "plans changed");
}

#[tokio::test]
async fn dispatch_routes_are_operator_only() {
    let app = app();

    let (status, _) = call(&app, Method::GET, "/dispatch/pending", Some("student-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pending) = call(&app, Method::GET, "/dispatch/pending", Some("ops-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn operator_assigns_a_driver() {
    let app = app();
    let (_, ride) = call(&app, Method::POST, "/rides", Some("student-token"), Some(ride_body())).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, driver) = call(
        &app,
        Method::POST,
        "/drivers",
        Some("ops-token"),
        Some(json!({
            "first_name": "Tumelo",
            "last_name": "Ramaphosa",
            "phone_number": "+27 15 555 0199",
            "email": null,
            "license_plate": "BX 42 LP",
            "vehicle_type": "minibus",
            "vehicle_make": "Toyota",
            "vehicle_model": "Quantum",
            "vehicle_color": "White",
            "seats": 14
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let driver_id = driver["id"].as_str().unwrap().to_string();

    let assign = json!({ "ride_id": ride_id, "driver_id": driver_id });
    let (status, body) = call(&app, Method::POST, "/dispatch/assign", Some("ops-token"), Some(assign.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "driver_unavailable");

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/drivers/{}/availability", driver_id),
        Some("ops-token"),
        Some(json!({ "is_available": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, assigned) = call(&app, Method::POST, "/dispatch/assign", Some("ops-token"), Some(assign.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["status"], "accepted");
    assert_eq!(assigned["assigned_driver"], driver_id.as_str());

    let (status, body) = call(&app, Method::POST, "/dispatch/assign", Some("ops-token"), Some(assign)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "request_not_pending");

    let (status, stats) = call(&app, Method::GET, "/dispatch/stats", Some("ops-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["accepted"], 1);
}

#[tokio::test]
async fn malformed_ride_id_is_a_bad_request() {
    let (status, body) = call(&app(), Method::GET, "/rides/not-a-ride", Some("student-token"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_ride_id");
}
