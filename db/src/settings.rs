use color_eyre::Result;
use kitchen::settings::Settings;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

/// Users that never saved settings get the defaults.
pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<Settings> {
    let stored = sqlx::query_scalar::<_, Json<Settings>>(
        "SELECT settings FROM user_settings WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(stored.map(|Json(s)| s).unwrap_or_default())
}

pub async fn save(pool: &PgPool, user_id: Uuid, settings: &Settings) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO user_settings (user_id, settings)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET settings = EXCLUDED.settings, updated_at = now()
        ",
    )
    .bind(user_id)
    .bind(Json(settings))
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_user;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn defaults_until_saved(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        assert_eq!(get(&pool, user.user_id).await?, Settings::default());

        let mut settings = Settings::default();
        settings.cooks = vec!["Sam".to_string(), "Alex".to_string()];
        save(&pool, user.user_id, &settings).await?;

        assert_eq!(get(&pool, user.user_id).await?.cooks, vec!["Sam", "Alex"]);

        Ok(())
    }
}
