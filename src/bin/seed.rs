use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{OrmConn, create_orm_conn, run_migrations},
    entity::{
        Categories, Products, Users, categories, products, sea_orm_active_enums::Role, users,
    },
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&orm, "user@example.com", "user123", Role::User).await?;
    seed_catalog(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(orm: &OrmConn, email: &str, password: &str, role: Role) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?
    {
        let mut active: users::ActiveModel = existing.into();
        active.role = Set(role);
        let user = active.update(orm).await?;
        println!("Ensured user {email} (role={role:?})");
        return Ok(user.id);
    }

    let password_hash = hash_password(password.to_string())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set(role),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Created user {email} (role={role:?})");
    Ok(user.id)
}

async fn seed_catalog(orm: &OrmConn) -> anyhow::Result<()> {
    let catalog = [
        (
            "Apparel",
            "Things to wear",
            vec![
                ("Axum Hoodie", "Warm hoodie for Rustaceans", 5500, 50),
                ("Crab T-Shirt", "Cotton tee with Ferris on it", 2500, 80),
            ],
        ),
        (
            "Accessories",
            "Desk and laptop extras",
            vec![
                ("Ferris Mug", "Coffee tastes better with Ferris", 1200, 100),
                ("Rust Sticker Pack", "Decorate your laptop", 500, 200),
            ],
        ),
        (
            "Books",
            "Reading material",
            vec![("E-book: Async Rust", "Learn async Rust patterns", 2500, 75)],
        ),
    ];

    for (category_name, category_desc, items) in catalog {
        let category_id = match Categories::find()
            .filter(categories::Column::Name.eq(category_name))
            .one(orm)
            .await?
        {
            Some(category) => category.id,
            None => {
                categories::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(category_name.to_string()),
                    description: Set(Some(category_desc.to_string())),
                    created_at: Set(Utc::now().into()),
                }
                .insert(orm)
                .await?
                .id
            }
        };

        for (name, desc, price, stock) in items {
            let exists = Products::find()
                .filter(products::Column::Name.eq(name))
                .one(orm)
                .await?
                .is_some();
            if exists {
                continue;
            }

            products::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name.to_string()),
                description: Set(Some(desc.to_string())),
                price: Set(price),
                stock: Set(stock),
                category_id: Set(category_id),
                created_at: Set(Utc::now().into()),
            }
            .insert(orm)
            .await?;
        }
    }

    println!("Seeded categories and products");
    Ok(())
}
