use argon2::{
    Argon2, PasswordHasher,
    password_hash::{rand_core::OsRng, SaltString},
};
use mobitrade_api::{
    config::AppConfig,
    db::create_pool,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_admin(&pool, "admin@example.com", "admin123").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_admin(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    ensure_user_with_role(pool, "Admin", email, password, "admin").await
}

async fn ensure_user(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    ensure_user_with_role(pool, "Demo User", email, password, "user").await
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

struct SeedVariant {
    storage: &'static str,
    condition: &'static str,
    color: &'static str,
    ram: &'static str,
    warranty_months: i32,
    price: Decimal,
    stock: i32,
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products: Vec<(&str, &str, &str, Vec<SeedVariant>)> = vec![
        (
            "iPhone 13",
            "iphone-13",
            "Refurbished Apple iPhone 13",
            vec![
                SeedVariant {
                    storage: "128GB",
                    condition: "Like New",
                    color: "Midnight",
                    ram: "4GB",
                    warranty_months: 12,
                    price: dec!(499.99),
                    stock: 10,
                },
                SeedVariant {
                    storage: "256GB",
                    condition: "Good",
                    color: "Starlight",
                    ram: "4GB",
                    warranty_months: 6,
                    price: dec!(449.99),
                    stock: 5,
                },
            ],
        ),
        (
            "Galaxy S22",
            "galaxy-s22",
            "Refurbished Samsung Galaxy S22",
            vec![
                SeedVariant {
                    storage: "128GB",
                    condition: "Like New",
                    color: "Phantom Black",
                    ram: "8GB",
                    warranty_months: 12,
                    price: dec!(399.99),
                    stock: 8,
                },
                SeedVariant {
                    storage: "256GB",
                    condition: "Fair",
                    color: "Green",
                    ram: "8GB",
                    warranty_months: 3,
                    price: dec!(329.99),
                    stock: 12,
                },
            ],
        ),
        (
            "Pixel 7",
            "pixel-7",
            "Refurbished Google Pixel 7",
            vec![SeedVariant {
                storage: "128GB",
                condition: "Good",
                color: "Obsidian",
                ram: "8GB",
                warranty_months: 6,
                price: dec!(299.99),
                stock: 15,
            }],
        ),
    ];

    for (name, slug, description, variants) in products {
        let (product_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, slug, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(pool)
        .await?;

        for variant in variants {
            sqlx::query(
                r#"
                INSERT INTO variants
                    (id, product_id, price, stock_quantity, storage, condition, color, ram, warranty_months)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (product_id, storage, condition) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(variant.price)
            .bind(variant.stock)
            .bind(variant.storage)
            .bind(variant.condition)
            .bind(variant.color)
            .bind(variant.ram)
            .bind(variant.warranty_months)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded catalog");
    Ok(())
}
