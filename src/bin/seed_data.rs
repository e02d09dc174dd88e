//! Seed data script - bootstraps a fresh storefront database
//!
//! Run with: cargo run --bin seed-data -- --admin-email ops@shop.example --admin-password ...
//!
//! This creates:
//! - the built-in roles (Developer, Master Admin, Vendor, Driver)
//! - the first Developer admin
//! - optionally, a small demo catalog (`--demo`)

use chrono::Utc;
use clap::Parser;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use storefront_api::{
    auth::{
        password::hash_password,
        permissions::{roles, Permission},
    },
    db::run_migrations,
    entities::{admin, role},
    services::{
        products::{CatalogService, CreateProductRequest},
        roles::{RoleRequest, RoleService},
    },
};

#[derive(Parser)]
#[command(name = "seed-data", version)]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://storefront.db?mode=rwc")]
    database_url: String,

    #[arg(long, env = "SEED_ADMIN_EMAIL")]
    admin_email: String,

    #[arg(long, env = "SEED_ADMIN_PASSWORD")]
    admin_password: String,

    #[arg(long, default_value = "Store")]
    first_name: String,

    #[arg(long, default_value = "Owner")]
    last_name: String,

    /// Also create a few demo products
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    if args.admin_password.len() < 6 {
        anyhow::bail!("admin password must be at least 6 characters");
    }

    info!("=== Storefront Seed Data ===");

    let mut options = ConnectOptions::new(args.database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10));

    info!("Connecting to database: {}", args.database_url);
    let db = Arc::new(Database::connect(options).await?);
    run_migrations(&db).await?;

    info!("Creating built-in roles...");
    let developer_role = ensure_builtin_roles(db.clone()).await?;

    info!("Creating first admin...");
    ensure_admin(&db, &args, developer_role).await?;

    if args.demo {
        info!("Creating demo catalog...");
        let created = create_demo_products(db.clone()).await?;
        info!("  Created {} products", created);
    }

    info!("=== Seed Data Complete ===");
    info!("Sign in with: POST /api/admin/signin");
    Ok(())
}

/// Creates any missing built-in role and returns the Developer role id.
async fn ensure_builtin_roles(db: Arc<DatabaseConnection>) -> anyhow::Result<Uuid> {
    let service = RoleService::new(db);
    let builtin = [
        (roles::DEVELOPER, Permission::all()),
        (roles::MASTER_ADMIN, Permission::all()),
        (
            roles::VENDOR,
            vec![
                Permission::AddProduct,
                Permission::UpdateProduct,
                Permission::ViewOrder,
                Permission::UpdateOrderStatus,
            ],
        ),
        (roles::DRIVER, vec![Permission::UpdateAddress]),
    ];

    let mut developer = None;
    for (name, permissions) in builtin {
        let view = match service.get_by_name(name).await {
            Ok(existing) => {
                info!("  {} already exists", name);
                existing
            }
            Err(_) => {
                let created = service
                    .create(RoleRequest {
                        name: name.to_string(),
                        permissions,
                    })
                    .await?;
                info!("  Created role {}", name);
                created
            }
        };
        if name == roles::DEVELOPER {
            developer = Some(view.id);
        }
    }

    developer.ok_or_else(|| anyhow::anyhow!("Developer role missing after seeding"))
}

async fn ensure_admin(db: &DatabaseConnection, args: &Args, role_id: Uuid) -> anyhow::Result<()> {
    let email = args.admin_email.trim().to_lowercase();
    let existing = admin::Entity::find()
        .filter(admin::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        info!("  {} already exists, leaving it untouched", email);
        return Ok(());
    }

    // Guard against a role table seeded by something else.
    role::Entity::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("role {} not found", role_id))?;

    let now = Utc::now();
    admin::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(args.first_name.clone()),
        last_name: Set(args.last_name.clone()),
        email: Set(email.clone()),
        password_hash: Set(hash_password(&args.admin_password)?),
        mobile: Set(None),
        role_id: Set(Some(role_id)),
        is_active: Set(true),
        is_deleted: Set(false),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!("  Created admin {}", email);
    Ok(())
}

async fn create_demo_products(db: Arc<DatabaseConnection>) -> anyhow::Result<usize> {
    let catalog = CatalogService::new(db);
    let products_data = vec![
        ("Classic Cotton T-Shirt", "Organic cotton crew neck.", "Northwind", dec!(24.99), dec!(10), ("Men", "Clothing", "T-Shirts")),
        ("Slim Fit Denim Jeans", "Stretch denim with a modern fit.", "Northwind", dec!(89.99), dec!(0), ("Men", "Clothing", "Jeans")),
        ("Merino Wool Sweater", "Temperature-regulating merino knit.", "Fjell", dec!(119.99), dec!(15), ("Women", "Clothing", "Sweaters")),
        ("Canvas Backpack 25L", "Water-resistant backpack with laptop sleeve.", "Fjell", dec!(79.99), dec!(5), ("Accessories", "Bags", "Backpacks")),
    ];

    let mut created = 0;
    for (name, description, brand, price, discount, (top, second, third)) in products_data {
        catalog
            .create_product(CreateProductRequest {
                name: name.to_string(),
                description: description.to_string(),
                brand: brand.to_string(),
                price: Some(price),
                discount_percent: Some(discount),
                quantity: Some(50),
                image: None,
                category_id: None,
                top_level_category: Some(top.to_string()),
                second_level_category: Some(second.to_string()),
                third_level_category: Some(third.to_string()),
                tags: vec![],
                gallery: vec![],
                variants: vec![],
            })
            .await?;
        created += 1;
    }

    Ok(created)
}
