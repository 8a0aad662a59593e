#![allow(dead_code)]

use ecofinds_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    state::AppState,
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Connect to the test database, or `None` when none is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    run_migrations(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        db_max_connections: 5,
        cors_origins: Vec::new(),
        frontend_url: "http://localhost:8080".into(),
    };
    Ok(Some(AppState::new(pool, config)))
}

/// Each test works with its own users and products so tests can share a database.
pub async fn create_user(state: &AppState) -> anyhow::Result<AuthUser> {
    let tag = Uuid::new_v4().simple().to_string();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(format!("user_{tag}")),
        email: Set(format!("{tag}@example.com")),
        password_hash: Set("dummy".into()),
        two_factor_enabled: NotSet,
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser { user_id: user.id })
}

pub async fn create_product(
    state: &AppState,
    seller: &AuthUser,
    title: &str,
    price: Decimal,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller.user_id),
        category_id: Set(None),
        title: Set(title.to_string()),
        description: Set("A product for testing the order flow".into()),
        price: Set(price),
        quantity: Set(10),
        condition: Set("New".into()),
        brand: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
