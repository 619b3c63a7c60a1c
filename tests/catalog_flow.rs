mod common;

use storefront_api::{
    dto::{
        cart::AddToCartRequest,
        catalog::{CreateCategoryRequest, CreateProductRequest, UpdateProductRequest},
    },
    entity::{CartItems, sea_orm_active_enums::Role},
    error::AppError,
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{cart_service, catalog_service, order_service},
};
use uuid::Uuid;

#[tokio::test]
async fn create_product_validates_input() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let category_id = common::create_category(&state, "Tools").await?;

    let missing_price = catalog_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: Some("Hammer".into()),
            category_id: Some(category_id),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(missing_price, Err(AppError::Validation(_))));

    let negative = catalog_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: Some("Hammer".into()),
            price: Some(-1),
            category_id: Some(category_id),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(negative, Err(AppError::Validation(_))));

    let unknown_category = catalog_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: Some("Hammer".into()),
            price: Some(900),
            category_id: Some(Uuid::new_v4()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(unknown_category, Err(AppError::NotFound(_))));

    let created = catalog_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: Some("Hammer".into()),
            price: Some(900),
            stock: Some(4),
            category_id: Some(category_id),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.price, 900);
    assert_eq!(created.stock, 4);
    Ok(())
}

#[tokio::test]
async fn update_product_changes_only_given_fields() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 3).await?;

    let updated = catalog_service::update_product(
        &state,
        &admin,
        product_id,
        UpdateProductRequest {
            price: Some(1750),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(updated.name, "Saw");
    assert_eq!(updated.price, 1750);
    assert_eq!(updated.stock, 3);
    assert_eq!(updated.category_id, category_id);

    let missing = catalog_service::update_product(
        &state,
        &admin,
        Uuid::new_v4(),
        UpdateProductRequest::default(),
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn duplicate_category_name_is_a_conflict() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;

    let request = || CreateCategoryRequest {
        name: Some("Garden".into()),
        description: None,
    };
    catalog_service::create_category(&state, &admin, request()).await?;
    let again = catalog_service::create_category(&state, &admin, request()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn category_with_products_cannot_be_deleted() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let product_id = common::create_product(&state, category_id, "Saw", 1500, 3).await?;

    let blocked = catalog_service::delete_category(&state, &admin, category_id).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    catalog_service::delete_product(&state, &admin, product_id).await?;
    catalog_service::delete_category(&state, &admin, category_id).await?;

    let gone = catalog_service::get_category(&state, category_id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn ordered_product_cannot_be_deleted_but_carted_one_can() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let user = common::create_user(&state, "user@example.com", Role::User).await?;
    let category_id = common::create_category(&state, "Tools").await?;
    let ordered = common::create_product(&state, category_id, "Saw", 1500, 3).await?;
    let carted = common::create_product(&state, category_id, "Drill", 4000, 2).await?;

    let add = |product_id| AddToCartRequest {
        product_id,
        quantity: 1,
    };
    cart_service::add_to_cart(&state, &user, add(ordered)).await?;
    order_service::place_order(&state, &user).await?;
    cart_service::add_to_cart(&state, &user, add(carted)).await?;

    let blocked = catalog_service::delete_product(&state, &admin, ordered).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    catalog_service::delete_product(&state, &admin, carted).await?;
    assert_eq!(common::count(&state, CartItems).await?, 0);
    Ok(())
}

#[tokio::test]
async fn list_products_filters_sorts_and_pages() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let tools = common::create_category(&state, "Tools").await?;
    let books = common::create_category(&state, "Books").await?;
    common::create_product(&state, tools, "Claw Hammer", 900, 5).await?;
    common::create_product(&state, tools, "Sledge Hammer", 2500, 5).await?;
    common::create_product(&state, books, "Hammer Novel", 1200, 5).await?;
    common::create_product(&state, books, "Cookbook", 3000, 5).await?;

    let page = catalog_service::list_products(
        &state,
        ProductQuery {
            q: Some("HAMMER".into()),
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?;
    let names: Vec<String> = page.data.unwrap().items.into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["Claw Hammer", "Hammer Novel", "Sledge Hammer"]);
    assert_eq!(page.meta.unwrap().total, Some(3));

    let page = catalog_service::list_products(
        &state,
        ProductQuery {
            category_id: Some(tools),
            min_price: Some(1000),
            ..Default::default()
        },
    )
    .await?;
    let items = page.data.unwrap().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Sledge Hammer");

    let page = catalog_service::list_products(
        &state,
        ProductQuery {
            page: Some(2),
            per_page: Some(3),
            sort_by: Some(ProductSortBy::Name),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?;
    let items = page.data.unwrap().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Sledge Hammer");
    Ok(())
}

#[tokio::test]
async fn restricted_delete_reports_a_foreign_key_violation() -> anyhow::Result<()> {
    use sea_orm::EntityTrait;
    use storefront_api::{entity::Categories, error::is_foreign_key_violation};

    let state = common::setup_state().await?;
    let category_id = common::create_category(&state, "Tools").await?;
    common::create_product(&state, category_id, "Hammer", 1500, 3).await?;

    // Deleting behind the reference check hits the RESTRICT key, which the
    // catalog service reports as a conflict.
    let err = Categories::delete_by_id(category_id)
        .exec(&state.orm)
        .await
        .expect_err("category is still referenced");
    assert!(is_foreign_key_violation(&err));
    Ok(())
}
