use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderHistory, OrderWithItems, PlacedOrder},
    error::AppResult,
    extract::AppPath,
    middleware::auth::{Access, AuthUser},
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/place", Access::Authenticated.guard(state, post(place_order)))
        .route("/history", Access::Authenticated.guard(state, get(order_history)))
        .route("/{id}", Access::Authenticated.guard(state, get(get_order)))
}

#[utoipa::path(
    post,
    path = "/order/place",
    responses(
        (status = 201, description = "Order placed from the cart", body = ApiResponse<PlacedOrder>),
        (status = 400, description = "Cart is empty or stock is insufficient"),
        (status = 409, description = "No unique invoice number could be allocated")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<(StatusCode, Json<ApiResponse<PlacedOrder>>)> {
    let resp = order_service::place_order(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/order/history",
    responses(
        (status = 200, description = "Orders of the current user, newest first", body = ApiResponse<OrderHistory>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn order_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderHistory>>> {
    let resp = order_service::order_history(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/order/{id}",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Order with items and invoice", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}
