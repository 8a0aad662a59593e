use ecofinds_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use rust_decimal::Decimal;
use uuid::Uuid;

const CATEGORIES: &[&str] = &[
    "kitchen",
    "accessories",
    "electronics",
    "personal care",
    "home",
    "clothing",
];

struct SeedProduct {
    title: &'static str,
    description: &'static str,
    price_cents: i64,
    quantity: i32,
    condition: &'static str,
    brand: Option<&'static str>,
    category: &'static str,
    image_url: &'static str,
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        title: "Bamboo Water Bottle",
        description: "Double-wall insulated bamboo bottle with a stainless steel flask and tea strainer.",
        price_cents: 59900,
        quantity: 87,
        condition: "New",
        brand: Some("Gift Kya De"),
        category: "kitchen",
        image_url: "https://images.unsplash.com/photo-1602143407151-7111542de6e8",
    },
    SeedProduct {
        title: "Jute Tote Bag",
        description: "Sturdy reusable jute shopping bag with cotton handles.",
        price_cents: 24950,
        quantity: 140,
        condition: "New",
        brand: None,
        category: "accessories",
        image_url: "https://images.unsplash.com/photo-1597484661643-2f5fef640dd1",
    },
    SeedProduct {
        title: "Refurbished Bluetooth Speaker",
        description: "Tested and refurbished portable speaker, eight hours of playback.",
        price_cents: 149900,
        quantity: 12,
        condition: "Used - Like New",
        brand: Some("SoundLoop"),
        category: "electronics",
        image_url: "https://images.unsplash.com/photo-1608043152269-423dbba4e7e1",
    },
    SeedProduct {
        title: "Neem Wood Comb",
        description: "Handmade anti-static neem wood comb, gentle on the scalp.",
        price_cents: 9900,
        quantity: 300,
        condition: "New",
        brand: None,
        category: "personal care",
        image_url: "https://images.unsplash.com/photo-1590159763121-7c9fd312190d",
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    for name in CATEGORIES {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(*name)
            .execute(&pool)
            .await?;
    }
    println!("Seeded categories");

    let seller_one = ensure_user(&pool, "EcoSellerOne", "seller1@example.com", "password123").await?;
    let seller_two = ensure_user(&pool, "GreenGoodsCo", "seller2@example.com", "password123").await?;

    for (idx, product) in PRODUCTS.iter().enumerate() {
        let seller = if idx % 2 == 0 { seller_one } else { seller_two };
        seed_product(&pool, seller, product).await?;
    }
    println!("Seeded products");

    pool.close().await;
    println!("Seed completed. Sellers: {seller_one}, {seller_two}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET username = EXCLUDED.username
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email}");
    Ok(row.0)
}

async fn seed_product(
    pool: &sqlx::PgPool,
    seller_id: Uuid,
    product: &SeedProduct,
) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE title = $1")
        .bind(product.title)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let category: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind(product.category)
        .fetch_optional(pool)
        .await?;

    let mut tx = pool.begin().await?;
    let product_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, seller_id, category_id, title, description, price, quantity, condition, brand)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(product_id)
    .bind(seller_id)
    .bind(category.map(|c| c.0))
    .bind(product.title)
    .bind(product.description)
    .bind(Decimal::new(product.price_cents, 2))
    .bind(product.quantity)
    .bind(product.condition)
    .bind(product.brand)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO product_images (id, product_id, position, url) VALUES ($1, $2, 0, $3)")
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(product.image_url)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
