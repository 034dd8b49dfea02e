//! API integration tests
//!
//! Drive the full router over the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use d4media_server::{
    config::AppConfig, create_router, repository::memory::MemoryStore, services::Services,
    AppState,
};

fn app() -> Router {
    let config = AppConfig::default();
    let services = Services::new(Arc::new(MemoryStore::new()), &config)
        .expect("Failed to create services");
    create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        request = request.header("x-actor", actor);
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).expect("Failed to build request"))
        .await
        .expect("Failed to send request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, value)
}

/// Decimals travel as strings
fn amount(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("Not a decimal"),
        other => other.as_f64().expect("Not a number"),
    }
}

async fn create_camera(app: &Router, code: &str, quantity: i32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/equipment",
        Some(json!({
            "code": code,
            "name": "Sony FX3",
            "category": "camera",
            "pricing": { "studio_rate": 500, "event_rate": 800, "rental_rate": 1000 },
            "available_quantity": quantity
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("No id").to_string()
}

fn requester() -> Value {
    json!({ "name": "Nadia Perera", "phone": null, "email": "nadia@example.com" })
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_duplicate_equipment_code() {
    let app = app();
    create_camera(&app, "CAM-100", 2).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/equipment",
        Some(json!({ "code": "CAM-100", "name": "Other", "available_quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 8);
}

#[tokio::test]
async fn test_rental_lifecycle() {
    let app = app();
    let camera = create_camera(&app, "CAM-200", 3).await;

    let (status, rental) = send(
        &app,
        Method::POST,
        "/reservations",
        Some(json!({
            "kind": "rental",
            "line_items": [{ "equipment_id": camera, "quantity": 2 }],
            "start": "2030-05-01T09:00:00Z",
            "end": "2030-05-03T09:00:00Z",
            "requester": requester(),
            "additional_charges": [{ "label": "delivery", "amount": 150 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rental["status"], "inquiry");
    assert_eq!(amount(&rental["pricing"]["total"]), 2150.0);
    let id = rental["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, &format!("/reservations/{}/invoice", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, confirmed) = send_as(
        &app,
        Method::PUT,
        &format!("/reservations/{}/status", id),
        Some(json!({ "status": "confirmed" })),
        Some("front-desk"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["approval"]["decided_by"], "front-desk");

    let (status, invoice) =
        send(&app, Method::GET, &format!("/reservations/{}/invoice", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&invoice["amount"]), 2150.0);

    let (status, out) = send(
        &app,
        Method::PUT,
        &format!("/reservations/{}/status", id),
        Some(json!({ "status": "checked_out" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["status"], "checked_out");

    let (_, item) = send(&app, Method::GET, &format!("/equipment/{}", camera), None).await;
    assert_eq!(item["current_quantity_out"], 2);
    assert_eq!(item["checkout_status"], "partially_checked_out");

    let (status, returned) = send(
        &app,
        Method::POST,
        &format!("/reservations/{}/return", id),
        Some(json!({ "items": [], "notes": "All good" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");

    let (_, item) = send(&app, Method::GET, &format!("/equipment/{}", camera), None).await;
    assert_eq!(item["current_quantity_out"], 0);
    assert_eq!(item["checkout_status"], "available");

    let (status, body) = send(&app, Method::DELETE, &format!("/reservations/{}", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 34);
}

#[tokio::test]
async fn test_studio_double_booking() {
    let app = app();
    let (status, studio) = send(
        &app,
        Method::POST,
        "/studios",
        Some(json!({ "name": "Studio A", "hourly_rate": 2500 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let studio_id = studio["id"].as_str().unwrap().to_string();

    let booking = |start: &str, end: &str| {
        json!({
            "kind": "studio_booking",
            "studio_id": studio_id,
            "start": start,
            "end": end,
            "requester": requester()
        })
    };

    let (status, first) = send(
        &app,
        Method::POST,
        "/reservations",
        Some(booking("2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/reservations/{}/status", first["id"].as_str().unwrap()),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/reservations",
        Some(booking("2030-06-01T11:00:00Z", "2030-06-01T13:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 32);

    let (status, report) = send(
        &app,
        Method::GET,
        &format!(
            "/availability?resource_type=studio&resource_id={}&start=2030-06-01T11:00:00Z&end=2030-06-01T13:00:00Z",
            studio_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["available"], false);
    assert_eq!(report["policy"], "exclusive");
    assert_eq!(report["conflicting_reservations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_approval_records_actor() {
    let app = app();
    let camera = create_camera(&app, "CAM-300", 1).await;

    let (status, pending) = send(
        &app,
        Method::POST,
        "/reservations",
        Some(json!({
            "kind": "equipment_checkout",
            "line_items": [{ "equipment_id": camera, "quantity": 1 }],
            "start": "2030-07-01T09:00:00Z",
            "end": "2030-07-01T18:00:00Z",
            "requester": requester()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "pending_approval");
    let id = pending["id"].as_str().unwrap().to_string();

    let (status, approved) = send_as(
        &app,
        Method::POST,
        &format!("/reservations/{}/approve", id),
        Some(json!({ "approved": true, "notes": "Handle with care" })),
        Some("studio-manager"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "checked_out");
    assert_eq!(approved["approval"]["decided_by"], "studio-manager");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/reservations/{}/approve", id),
        Some(json!({ "approved": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 30);

    let (_, item) = send(&app, Method::GET, &format!("/equipment/{}", camera), None).await;
    assert_eq!(item["checkout_status"], "checked_out");
}

#[tokio::test]
async fn test_price_estimate() {
    let app = app();
    let camera = create_camera(&app, "CAM-400", 2).await;
    let (status, price) = send(
        &app,
        Method::POST,
        "/pricing/estimate",
        Some(json!({
            "kind": "rental",
            "start": "2030-08-01T09:00:00Z",
            "end": "2030-08-04T09:00:00Z",
            "base_rate": 100,
            "line_items": [{ "equipment_id": camera, "quantity": 2, "rate": 50 }],
            "additional_charges": [{ "label": "transport", "amount": 20 }],
            "discount": 30
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(price["duration_units"], 3);
    assert_eq!(amount(&price["total"]), 390.0);
}

#[tokio::test]
async fn test_unknown_reservation() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/reservations/00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);
}
