use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, ProductList,
        UpdateCategoryRequest, UpdateProductRequest,
    },
    entity::{
        Categories, OrderItems, Products,
        categories::{ActiveModel as CategoryActive, Column as CategoryCol},
        order_items::Column as OrderItemCol,
        products::{ActiveModel as ProductActive, Column as ProdCol},
    },
    error::{AppError, AppResult, is_foreign_key_violation, is_unique_violation},
    middleware::auth::AuthUser,
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items: Vec<Category> = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Category", category.into(), None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let name = non_blank(payload.name)
        .ok_or_else(|| AppError::Validation("Category name is required".into()))?;

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| name_conflict(err, "Category"))?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category added successfully",
        category.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let mut active: CategoryActive = existing.into();
    if let Some(name) = payload.name {
        let name = non_blank(Some(name))
            .ok_or_else(|| AppError::Validation("Category name must not be blank".into()))?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }

    let category = active
        .update(&state.orm)
        .await
        .map_err(|err| name_conflict(err, "Category"))?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category updated successfully",
        category.into(),
        Some(Meta::empty()),
    ))
}

/// Refuses while any product still belongs to the category.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if Categories::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Category"));
    }

    let products = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if products > 0 {
        return Err(AppError::Conflict(format!(
            "Category still has {products} product(s)"
        )));
    }

    let result = Categories::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| still_referenced(err, "Category still has products"))?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Category"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category deleted successfully",
        serde_json::json!({ "category_id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(ProdCol::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(ProdCol::Description))).like(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(ProdCol::CategoryId.eq(category_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Name => ProdCol::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", product.into(), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let missing = || AppError::Validation("Name, price, and category_id are required".into());
    let name = non_blank(payload.name).ok_or_else(missing)?;
    let price = payload.price.ok_or_else(missing)?;
    let category_id = payload.category_id.ok_or_else(missing)?;
    let stock = payload.stock.unwrap_or(0);
    validate_amounts(Some(price), Some(stock))?;
    ensure_category(state, category_id).await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price: Set(price),
        stock: Set(stock),
        category_id: Set(category_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added successfully",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_amounts(payload.price, payload.stock)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        let name = non_blank(Some(name))
            .ok_or_else(|| AppError::Validation("Product name must not be blank".into()))?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        ensure_category(state, category_id).await?;
        active.category_id = Set(category_id);
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product.into(),
        Some(Meta::empty()),
    ))
}

/// Refuses once the product appears on any order; cart lines go with it.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if Products::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product is referenced by existing orders".into(),
        ));
    }

    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| still_referenced(err, "Product is referenced by existing orders"))?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({ "product_id": id }),
        Some(Meta::empty()),
    ))
}

async fn ensure_category(state: &AppState, id: Uuid) -> AppResult<()> {
    match Categories::find_by_id(id).one(&state.orm).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Category")),
    }
}

fn validate_amounts(price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::Validation("stock must not be negative".into()));
    }
    Ok(())
}

fn still_referenced(err: sea_orm::DbErr, message: &str) -> AppError {
    if is_foreign_key_violation(&err) {
        AppError::Conflict(message.into())
    } else {
        AppError::Db(err)
    }
}

fn name_conflict(err: sea_orm::DbErr, what: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(format!("{what} name already exists"))
    } else {
        AppError::Db(err)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
