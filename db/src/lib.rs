use color_eyre::eyre::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub mod cooking;

pub use sqlx;
pub use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    #[tracing::instrument(name = "DbConfig::from_env")]
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").wrap_err("Missing DATABASE_URL, needed to connect")?;
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .wrap_err_with(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {raw}"))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[tracing::instrument(err, skip(config))]
pub async fn setup_db_pool(config: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .wrap_err("Failed to connect to the database")?;

    run_migrations(&pool).await?;

    Ok(pool)
}

#[tracing::instrument(err, skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x0C00_C00C_00C0_0C00;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(pool)
        .await
        .wrap_err("Failed to take the migration lock")?;

    let migrated = sqlx::migrate!().run(pool).await;

    let unlocked: Option<bool> = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to release the migration lock")?;

    match unlocked {
        Some(true) => tracing::info!("Migration lock unlocked"),
        _ => tracing::warn!("Failed to unlock migration lock"),
    }

    migrated.wrap_err("Failed to run migrations")?;

    Ok(())
}
