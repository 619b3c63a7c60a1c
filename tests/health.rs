mod common;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use storefront_api::routes::{create_app, health::health_check};

#[tokio::test]
async fn health_check_returns_ok() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let (code, response) = health_check(State(state)).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "ok");
    Ok(())
}

#[tokio::test]
async fn health_route_and_fallback_answer_with_envelope() -> anyhow::Result<()> {
    let app = create_app(common::setup_state().await?);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = response.into_body().collect().await?.to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["message"], "Not Found");
    assert_eq!(body["data"]["path"], "/nope");
    Ok(())
}
