use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::catalog::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, ProductList,
        UpdateCategoryRequest, UpdateProductRequest,
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::{Access, AuthUser},
    models::{Category, Product},
    response::ApiResponse,
    routes::params::ProductQuery,
    services::catalog_service,
    state::AppState,
};

/// Reads are open to everyone; writes need an admin.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/category", Access::Public.guard(state, get(list_categories)))
        .route("/category", Access::AdminOnly.guard(state, post(create_category)))
        .route("/category/{id}", Access::Public.guard(state, get(get_category)))
        .route("/category/{id}", Access::AdminOnly.guard(state, put(update_category)))
        .route("/category/{id}", Access::AdminOnly.guard(state, delete(delete_category)))
        .route("/product", Access::Public.guard(state, get(list_products)))
        .route("/product", Access::AdminOnly.guard(state, post(create_product)))
        .route("/product/{id}", Access::Public.guard(state, get(get_product)))
        .route("/product/{id}", Access::AdminOnly.guard(state, put(update_product)))
        .route("/product/{id}", Access::AdminOnly.guard(state, delete(delete_product)))
}

#[utoipa::path(
    get,
    path = "/admin/category",
    responses(
        (status = 200, description = "All categories by name", body = ApiResponse<CategoryList>)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = catalog_service::list_categories(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/category",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let resp = catalog_service::create_category(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/admin/category/{id}",
    params(
        ("id" = Uuid, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found")
    ),
    tag = "Catalog"
)]
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = catalog_service::get_category(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/admin/category/{id}",
    params(
        ("id" = Uuid, Path, description = "Category id")
    ),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = catalog_service::update_category(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/admin/category/{id}",
    params(
        ("id" = Uuid, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still has products")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/product",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20, max 100"),
        ("q" = Option<String>, Query, description = "Search in name and description"),
        ("category_id" = Option<Uuid>, Query, description = "Only products of this category"),
        ("min_price" = Option<i64>, Query, description = "Lowest price, inclusive"),
        ("max_price" = Option<i64>, Query, description = "Highest price, inclusive"),
        ("sort_by" = Option<String>, Query, description = "created_at | price | name"),
        ("sort_order" = Option<String>, Query, description = "asc | desc")
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Missing or negative fields"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = catalog_service::create_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/admin/product/{id}",
    params(
        ("id" = Uuid, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/admin/product/{id}",
    params(
        ("id" = Uuid, Path, description = "Product id")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 400, description = "Negative price or stock"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product or category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/admin/product/{id}",
    params(
        ("id" = Uuid, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is part of an order")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}
