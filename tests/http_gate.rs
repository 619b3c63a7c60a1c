mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use sea_orm::EntityTrait;
use serde_json::{Value, json};
use tower::ServiceExt;

use storefront_api::{
    entity::{Categories, Products, sea_orm_active_enums::Role},
    routes::create_app,
    services::auth_service::issue_token,
    state::AppState,
};

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<Response> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };
    Ok(app.clone().oneshot(request).await?)
}

async fn json_body(response: Response) -> anyhow::Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

async fn token_for(state: &AppState, email: &str, role: Role) -> anyhow::Result<String> {
    let user = common::create_user(state, email, role).await?;
    Ok(issue_token(&state.config, user.user_id)?)
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());

    let response = send(&app, "GET", "/cart", None, None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert!(body["data"]["error"].is_string());

    let response = send(&app, "GET", "/order/history", Some("not-a-jwt"), None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A well-signed token for a user that does not exist.
    let ghost = issue_token(&state.config, uuid::Uuid::new_v4())?;
    let response = send(&app, "GET", "/auth/me", Some(&ghost), None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = token_for(&state, "user@example.com", Role::User).await?;
    let response = send(&app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["email"], "user@example.com");
    assert!(body["data"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn non_admin_mutation_is_forbidden_and_changes_nothing() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let token = token_for(&state, "user@example.com", Role::User).await?;

    let response = send(
        &app,
        "POST",
        "/admin/category",
        Some(&token),
        Some(json!({ "name": "Sneaky" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(common::count(&state, Categories).await?, 0);

    let response = send(&app, "GET", "/admin/orders", Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn non_admin_cannot_edit_or_delete_products() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let token = token_for(&state, "user@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Hammer", 1500, 3).await?;
    let uri = format!("/admin/product/{product_id}");

    let response = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "price": 1, "stock": 999 })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, "DELETE", &uri, Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product still exists");
    assert_eq!(product.price, 1500);
    assert_eq!(product.stock, 3);
    Ok(())
}

#[tokio::test]
async fn huge_page_numbers_are_clamped() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let category_id = common::create_category(&state, "Tools").await?;
    common::create_product(&state, category_id, "Hammer", 1500, 3).await?;

    let response = send(
        &app,
        "GET",
        "/admin/product?page=9223372036854775807&per_page=2",
        None,
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let token = token_for(&state, "admin@example.com", Role::Admin).await?;
    let response = send(
        &app,
        "GET",
        "/admin/orders?page=9223372036854775807",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admin_manages_catalog_and_anyone_can_browse() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let token = token_for(&state, "admin@example.com", Role::Admin).await?;

    let response = send(
        &app,
        "POST",
        "/admin/category",
        Some(&token),
        Some(json!({ "name": "Tools", "description": "Hand tools" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category_id = json_body(response).await?["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        "POST",
        "/admin/product",
        Some(&token),
        Some(json!({ "name": "Saw", "price": 1500, "stock": 3, "category_id": category_id })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, "GET", "/admin/category", None, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"][0]["name"], "Tools");

    let response = send(&app, "GET", "/admin/product?q=saw&per_page=5", None, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"][0]["name"], "Saw");
    assert_eq!(body["meta"]["per_page"], 5);

    let response = send(
        &app,
        "DELETE",
        &format!("/admin/category/{category_id}"),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn customer_checkout_over_http() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let category_id = common::create_category(&state, "General").await?;
    let product_id = common::create_product(&state, category_id, "Widget", 10, 5).await?;
    let token = token_for(&state, "user@example.com", Role::User).await?;

    let response = send(
        &app,
        "POST",
        "/cart/add",
        Some(&token),
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "POST", "/order/place", Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["total_amount"], 20);
    assert_eq!(body["data"]["invoice_number"].as_str().map(str::len), Some(8));

    let response = send(&app, "POST", "/order/place", Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Cart is empty");

    let response = send(&app, "GET", "/order/history", Some(&token), None).await?;
    let body = json_body(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn malformed_input_gets_the_error_envelope() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let app = create_app(state.clone());
    let token = token_for(&state, "user@example.com", Role::User).await?;

    let request = Request::builder()
        .method("POST")
        .uri("/cart/add")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert!(body["data"]["error"].is_string());

    let response = send(&app, "GET", "/order/not-a-uuid", Some(&token), None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert!(body["message"].is_string());
    Ok(())
}
