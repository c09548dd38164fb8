use std::collections::HashMap;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
struct LastRun {
    name: String,
    last_run_at: DateTime<Utc>,
}

pub async fn last_runs(pool: &PgPool) -> Result<HashMap<String, DateTime<Utc>>> {
    let rows = sqlx::query_as::<_, LastRun>("SELECT name, last_run_at FROM crons")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|r| (r.name, r.last_run_at)).collect())
}

pub async fn record_run(pool: &PgPool, name: &str, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO crons (name, last_run_at)
        VALUES ($1, $2)
        ON CONFLICT (name)
        DO UPDATE SET last_run_at = EXCLUDED.last_run_at, updated_at = now()
        ",
    )
    .bind(name)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(())
}
