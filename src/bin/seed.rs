use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    ActiveValue::NotSet,
};
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    entity::{
        collections::{ActiveModel as CollectionActive, Column as CollectionCol, Entity as Collections},
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    services::{auth_service::hash_password, product_service::slugify},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin", "admin@example.com", "admin1234", true).await?;
    let user_id = ensure_user(&orm, "user", "user@example.com", "user12345", false).await?;
    seed_catalog(&orm).await?;

    tracing::info!(admin_id, user_id, "seed completed");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    is_staff: bool,
) -> anyhow::Result<i32> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Username.eq(username))
        .one(orm)
        .await?
    {
        return Ok(existing.id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: NotSet,
        email: Set(email.to_string()),
        username: Set(username.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set(password_hash),
        is_staff: Set(is_staff),
        can_cancel_order: Set(is_staff),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    tracing::info!(username, is_staff, "ensured user");
    Ok(user.id)
}

async fn seed_catalog(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let catalog = [
        (
            "Beauty",
            vec![("Lavender Soap", "Cold-pressed soap bar", Decimal::new(450, 2), 120)],
        ),
        (
            "Grocery",
            vec![
                ("Arabica Beans 1kg", "Medium roast coffee", Decimal::new(2199, 2), 40),
                ("Green Tea", "Loose leaf, 250g", Decimal::new(899, 2), 75),
            ],
        ),
        (
            "Stationery",
            vec![("Dotted Notebook", "A5, 160 pages", Decimal::new(1250, 2), 200)],
        ),
    ];

    for (title, products) in catalog {
        let collection = match Collections::find()
            .filter(CollectionCol::Title.eq(title))
            .one(orm)
            .await?
        {
            Some(existing) => existing,
            None => {
                CollectionActive {
                    id: NotSet,
                    title: Set(title.to_string()),
                }
                .insert(orm)
                .await?
            }
        };

        for (name, description, unit_price, inventory) in products {
            let exists = Products::find()
                .filter(ProductCol::Title.eq(name))
                .one(orm)
                .await?
                .is_some();
            if exists {
                continue;
            }
            ProductActive {
                id: NotSet,
                title: Set(name.to_string()),
                slug: Set(slugify(name)),
                description: Set(Some(description.to_string())),
                unit_price: Set(unit_price),
                inventory: Set(inventory),
                last_update: Set(chrono::Utc::now().into()),
                collection_id: Set(collection.id),
            }
            .insert(orm)
            .await?;
        }
    }

    tracing::info!("seeded catalog");
    Ok(())
}
