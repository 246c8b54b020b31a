use chrono::{Duration, Utc};
use food_order_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        foods::{ActiveModel as FoodActive, Column as FoodCol, Entity as Foods},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    middleware::auth::Claims,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, sea_query::OnConflict,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin").await?;
    let user_id = ensure_user(&orm, "user@example.com", "user").await?;
    seed_foods(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    println!(
        "Admin token: {}",
        dev_token(&config.jwt_secret, admin_id, "admin")?
    );
    println!("User token: {}", dev_token(&config.jwt_secret, user_id, "user")?);
    Ok(())
}

async fn ensure_user(orm: &DatabaseConnection, email: &str, role: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    };
    Users::insert(user)
        .on_conflict(
            OnConflict::column(UserCol::Email)
                .update_column(UserCol::Role)
                .to_owned(),
        )
        .exec_without_returning(orm)
        .await?;

    // The row may have existed before, so read the id back.
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {email} missing after upsert"))?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_foods(orm: &DatabaseConnection) -> anyhow::Result<()> {
    // Prices in kobo.
    let foods = vec![
        ("Jollof Rice", "Smoky party jollof with plantain", 250_000, None),
        ("Chicken Suya", "Spicy grilled chicken skewers", 300_000, Some(270_000)),
        ("Egusi Soup", "Melon seed soup with pounded yam", 350_000, None),
        ("Chapman", "Fruity house cocktail", 125_050, None),
    ];

    for (name, desc, price, discount_price) in foods {
        let exists = Foods::find()
            .filter(FoodCol::Name.eq(name))
            .count(orm)
            .await?;
        if exists > 0 {
            continue;
        }
        let now = Utc::now();
        FoodActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(desc.to_string())),
            price: Set(price),
            discount_price: Set(discount_price),
            is_available: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded foods");
    Ok(())
}

/// Tokens are normally issued by the identity service; these are for local testing.
fn dev_token(secret: &str, user_id: Uuid, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
