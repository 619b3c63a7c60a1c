use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLine, CartView},
    entity::{
        CartItems, Carts, Products,
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Model as CartItemModel},
        carts::{ActiveModel as CartActive, Column as CartCol, Model as CartModel},
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let Some(cart) = find_cart(state, user.user_id).await? else {
        return Ok(ApiResponse::success(
            "OK",
            CartView {
                cart_id: None,
                items: Vec::new(),
            },
            Some(Meta::new(1, 0, 0)),
        ));
    };

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .order_by_asc(CartItemCol::AddedAt)
        .all(&state.orm)
        .await?;

    let items: Vec<CartLine> = rows
        .into_iter()
        .filter_map(|(item, product)| {
            let product = product?;
            Some(CartLine {
                id: item.id,
                line_total: product.price.saturating_mul(i64::from(item.quantity)),
                quantity: item.quantity,
                added_at: item.added_at.with_timezone(&Utc),
                product: Product::from(product),
            })
        })
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        CartView {
            cart_id: Some(cart.id),
            items,
        },
        Some(Meta::new(1, total, total)),
    ))
}

/// Add `quantity` of a product, merging with an existing line. Stock is
/// checked against the merged quantity but never reserved.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let cart = find_cart(state, user.user_id).await?;
    let existing = match &cart {
        Some(cart) => find_line(state, cart.id, product.id).await?,
        None => None,
    };

    let in_cart = existing.as_ref().map_or(0, |item| item.quantity);
    let requested = in_cart
        .checked_add(payload.quantity)
        .ok_or_else(|| AppError::Validation("quantity is too large".into()))?;
    if requested > product.stock {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
            requested,
            available: product.stock,
        });
    }

    let cart = match cart {
        Some(cart) => cart,
        None => ensure_cart(state, user.user_id).await?,
    };

    let item_id = match existing {
        Some(item) => {
            increment_line(state, item.id, payload.quantity).await?;
            item.id
        }
        None => {
            let inserted = CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(payload.quantity),
                added_at: Set(Utc::now().into()),
            }
            .insert(&state.orm)
            .await;

            match inserted {
                Ok(item) => item.id,
                // Another request added the same product first.
                Err(err) if is_unique_violation(&err) => {
                    let item = find_line(state, cart.id, product.id)
                        .await?
                        .ok_or_else(|| AppError::not_found("Cart item"))?;
                    increment_line(state, item.id, payload.quantity).await?;
                    item.id
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    let item = CartItems::find_by_id(item_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product.id, "quantity": item.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", item.into(), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart = find_cart(state, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;

    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartItemCol::Id.eq(item_id))
                .add(CartItemCol::CartId.eq(cart.id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart item"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_cart(state: &AppState, user_id: Uuid) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?)
}

/// Create the user's cart on first use. The unique key on `user_id` decides
/// races; the loser reads back the winner's row.
async fn ensure_cart(state: &AppState, user_id: Uuid) -> AppResult<CartModel> {
    let inserted = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await;

    match inserted {
        Ok(cart) => Ok(cart),
        Err(err) if is_unique_violation(&err) => find_cart(state, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Cart")),
        Err(err) => Err(err.into()),
    }
}

async fn find_line(
    state: &AppState,
    cart_id: Uuid,
    product_id: Uuid,
) -> AppResult<Option<CartItemModel>> {
    Ok(CartItems::find()
        .filter(
            Condition::all()
                .add(CartItemCol::CartId.eq(cart_id))
                .add(CartItemCol::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?)
}

async fn increment_line(state: &AppState, item_id: Uuid, by: i32) -> AppResult<()> {
    CartItems::update_many()
        .col_expr(
            CartItemCol::Quantity,
            Expr::col(CartItemCol::Quantity).add(by),
        )
        .filter(CartItemCol::Id.eq(item_id))
        .exec(&state.orm)
        .await?;
    Ok(())
}
