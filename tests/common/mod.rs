#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        Products, categories::ActiveModel as CategoryActive,
        products::ActiveModel as ProductActive, sea_orm_active_enums::Role,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    state::AppState,
};

/// Fresh in-memory store with the full schema applied.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let config = AppConfig::for_tests();
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    Ok(AppState::new(orm, config))
}

pub async fn create_user(state: &AppState, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_category(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

pub async fn create_product(
    state: &AppState,
    category_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        stock: Set(stock),
        category_id: Set(category_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    Ok(product.stock)
}

pub async fn count<E>(state: &AppState, _entity: E) -> anyhow::Result<u64>
where
    E: EntityTrait,
    E::Model: Sync,
{
    Ok(E::find().count(&state.orm).await?)
}
