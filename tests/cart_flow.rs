mod common;

use storefront_api::{
    dto::cart::AddToCartRequest,
    entity::{Carts, sea_orm_active_enums::Role},
    error::AppError,
    services::cart_service,
};
use uuid::Uuid;

fn add(product_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
    }
}

#[tokio::test]
async fn empty_cart_is_not_an_error() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_user(&state, "user@example.com", Role::User).await?;

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert!(cart.cart_id.is_none());
    assert!(cart.items.is_empty());
    assert_eq!(common::count(&state, Carts).await?, 0);
    Ok(())
}

#[tokio::test]
async fn adding_the_same_product_merges_quantities() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_user(&state, "user@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 10).await?;

    cart_service::add_to_cart(&state, &user, add(product_id, 2)).await?;
    let merged = cart_service::add_to_cart(&state, &user, add(product_id, 3))
        .await?
        .data
        .unwrap();
    assert_eq!(merged.quantity, 5);

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.cart_id, Some(merged.cart_id));
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.items[0].product.id, product_id);
    assert_eq!(cart.items[0].line_total, 7500);

    // Adding never touches stock.
    assert_eq!(common::stock_of(&state, product_id).await?, 10);
    assert_eq!(common::count(&state, Carts).await?, 1);
    Ok(())
}

#[tokio::test]
async fn exceeding_stock_leaves_cart_unchanged() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_user(&state, "user@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 4).await?;

    let first = cart_service::add_to_cart(&state, &user, add(product_id, 5)).await;
    assert!(matches!(
        first,
        Err(AppError::InsufficientStock {
            requested: 5,
            available: 4,
            ..
        })
    ));
    assert_eq!(common::count(&state, Carts).await?, 0);

    cart_service::add_to_cart(&state, &user, add(product_id, 3)).await?;
    let merged = cart_service::add_to_cart(&state, &user, add(product_id, 2)).await;
    assert!(matches!(
        merged,
        Err(AppError::InsufficientStock { requested: 5, .. })
    ));

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    Ok(())
}

#[tokio::test]
async fn invalid_quantity_and_unknown_product_are_rejected() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_user(&state, "user@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 4).await?;

    let zero = cart_service::add_to_cart(&state, &user, add(product_id, 0)).await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    let unknown = cart_service::add_to_cart(&state, &user, add(Uuid::new_v4(), 1)).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn remove_only_touches_own_cart() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let owner = common::create_user(&state, "owner@example.com", Role::User).await?;
    let other = common::create_user(&state, "other@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 4).await?;

    let item = cart_service::add_to_cart(&state, &owner, add(product_id, 1))
        .await?
        .data
        .unwrap();
    // The other user needs a cart of their own for the ownership check to matter.
    cart_service::add_to_cart(&state, &other, add(product_id, 1)).await?;

    let foreign = cart_service::remove_from_cart(&state, &other, item.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    cart_service::remove_from_cart(&state, &owner, item.id).await?;
    let cart = cart_service::get_cart(&state, &owner).await?.data.unwrap();
    assert!(cart.items.is_empty());

    let again = cart_service::remove_from_cart(&state, &owner, item.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
    Ok(())
}
