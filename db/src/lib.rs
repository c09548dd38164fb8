use color_eyre::{eyre::Context as _, Result};
use sqlx::postgres::PgPoolOptions;

pub mod crons;
pub mod google_links;
pub mod households;
pub mod meal_plans;
pub mod pantry;
pub mod recipes;
pub mod scans;
pub mod sessions;
pub mod settings;
pub mod shopping_checks;
pub mod shopping_extras;
pub mod sync_documents;
pub mod templates;
pub mod users;

#[cfg(test)]
pub(crate) mod test_utils;

pub use sqlx;
pub use sqlx::PgPool;

const MIGRATION_LOCK_ID: i64 = 0x4D_45_41_4C_50_4C_4E;

#[tracing::instrument(err)]
pub async fn setup_db_pool() -> Result<PgPool> {
    let database_url =
        std::env::var("DATABASE_URL").wrap_err("DATABASE_URL must be set to reach Postgres")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .wrap_err("Failed to connect to DATABASE_URL")?;

    migrate(&pool).await?;

    Ok(pool)
}

/// Runs the embedded migrations under a Postgres advisory lock.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    // Advisory locks belong to a connection, so hold one for the whole run
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&mut *conn)
        .await?;

    let migrated = sqlx::migrate!().run(&mut *conn).await;

    let unlocked: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(&mut *conn)
        .await?;

    if unlocked {
        tracing::info!("Migration lock unlocked");
    } else {
        tracing::warn!("Failed to unlock migration lock");
    }

    migrated.wrap_err("Failed to run migrations")
}
