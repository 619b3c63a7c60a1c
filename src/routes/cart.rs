use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView},
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::{Access, AuthUser},
    models::CartItem,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", Access::Authenticated.guard(state, get(cart_list)))
        .route("/add", Access::Authenticated.guard(state, post(add_to_cart)))
        .route(
            "/remove/{id}",
            Access::Authenticated.guard(state, delete(remove_from_cart)),
        )
}

#[utoipa::path(
    get,
    path = "/cart",
    responses(
        (status = 200, description = "Cart of the current user", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or merged", body = ApiResponse<CartItem>),
        (status = 400, description = "Invalid quantity or insufficient stock"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/cart/remove/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart item id")
    ),
    responses(
        (status = 200, description = "Removed from cart"),
        (status = 404, description = "Cart item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(&state, &user, id).await?;
    Ok(Json(resp))
}
