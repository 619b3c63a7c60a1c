use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, UpdateInvoiceStatusRequest, UpdateOrderStatusRequest},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::{Access, AuthUser},
    models::{Invoice, Order},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::admin_service,
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", Access::AdminOnly.guard(state, get(list_all_orders)))
        .route(
            "/orders/{id}/status",
            Access::AdminOnly.guard(state, patch(update_order_status)),
        )
        .route(
            "/orders/{id}/invoice",
            Access::AdminOnly.guard(state, patch(update_invoice_status)),
        )
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20, max 100"),
        ("status" = Option<String>, Query, description = "pending | shipped | delivered | cancelled"),
        ("sort_order" = Option<String>, Query, description = "asc | desc on created_at")
    ),
    responses(
        (status = 200, description = "Orders of every user", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/invoice",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    request_body = UpdateInvoiceStatusRequest,
    responses(
        (status = 200, description = "Invoice updated", body = ApiResponse<Invoice>),
        (status = 400, description = "Invoice already settled"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateInvoiceStatusRequest>,
) -> AppResult<Json<ApiResponse<Invoice>>> {
    let resp = admin_service::update_invoice_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
