//! HTTP API tests
//!
//! Router-level tests via tower's oneshot; no sockets, no network.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dossier_common::events::EventBus;
use dossier_en::gateway::gateway_for;
use dossier_en::types::Source;
use dossier_en::{build_router, AppState};
use helpers::{company_record, MockProvider};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_state() -> AppState {
    let gateways = vec![gateway_for(Arc::new(MockProvider::succeeding(
        Source::CompanyRegistry,
        vec![company_record(
            Source::CompanyRegistry,
            "Acme",
            "12345678000190",
        )],
    )))];

    AppState::new(EventBus::new(100), None, gateways, None)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "dossier-en");
    assert_eq!(json["providers"], 1);
}

#[tokio::test]
async fn test_start_research_requires_name() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_start_research_returns_run_id_and_snapshot() {
    let state = test_state();
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/research")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name": "Acme", "kind": "company"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let run_id = json["run_id"].as_str().expect("run_id in response");

    // The initial snapshot is visible immediately
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/research/{}", run_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["query"]["name"], "Acme");
    assert!(json["state"].is_string());
}

#[tokio::test]
async fn test_get_unknown_run_is_404() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/research/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unknown_run_is_404() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/research/{}/cancel", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
