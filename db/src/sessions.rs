use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

pub const SESSION_DAYS: i32 = 30;

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub async fn create(pool: &PgPool, user_id: Uuid) -> Result<Self> {
        let session = sqlx::query_as::<_, Session>(
            r"
            INSERT INTO sessions (user_id, expires_at)
            VALUES ($1, now() + make_interval(days => $2))
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(SESSION_DAYS)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    /// Only sessions that haven't expired yet.
    pub async fn get_active(pool: &PgPool, session_id: Uuid) -> Result<Option<Self>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE session_id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    pub async fn delete(pool: &PgPool, session_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn prune_expired(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_user;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn expired_sessions_are_invisible(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        let live = Session::create(&pool, user.user_id).await?;
        let stale = Session::create(&pool, user.user_id).await?;

        sqlx::query("UPDATE sessions SET expires_at = now() - interval '1 day' WHERE session_id = $1")
            .bind(stale.session_id)
            .execute(&pool)
            .await?;

        assert!(Session::get_active(&pool, live.session_id).await?.is_some());
        assert!(Session::get_active(&pool, stale.session_id).await?.is_none());
        assert_eq!(Session::prune_expired(&pool).await?, 1);

        Session::delete(&pool, live.session_id).await?;
        assert!(Session::get_active(&pool, live.session_id).await?.is_none());

        Ok(())
    }
}
