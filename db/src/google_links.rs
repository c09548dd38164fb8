use chrono::{DateTime, Utc};
use color_eyre::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Google account connected for calendar export. Tokens are stored encrypted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GoogleLink {
    pub user_id: Uuid,
    pub google_email: Option<String>,
    pub encrypted_access_token: Vec<u8>,
    pub encrypted_refresh_token: Option<Vec<u8>>,
    pub access_token_expires_at: DateTime<Utc>,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewGoogleLink<'a> {
    pub google_email: Option<&'a str>,
    pub encrypted_access_token: &'a [u8],
    pub encrypted_refresh_token: Option<&'a [u8]>,
    pub access_token_expires_at: DateTime<Utc>,
    pub scope: &'a str,
}

impl GoogleLink {
    /// Reconnecting replaces the tokens but keeps an old refresh token when
    /// Google doesn't hand out a new one.
    pub async fn upsert(pool: &PgPool, user_id: Uuid, link: NewGoogleLink<'_>) -> Result<Self> {
        let link = sqlx::query_as::<_, GoogleLink>(
            r"
            INSERT INTO google_links (
                user_id, google_email, encrypted_access_token, encrypted_refresh_token,
                access_token_expires_at, scope
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                google_email = COALESCE(EXCLUDED.google_email, google_links.google_email),
                encrypted_access_token = EXCLUDED.encrypted_access_token,
                encrypted_refresh_token = COALESCE(
                    EXCLUDED.encrypted_refresh_token,
                    google_links.encrypted_refresh_token
                ),
                access_token_expires_at = EXCLUDED.access_token_expires_at,
                scope = EXCLUDED.scope,
                updated_at = now()
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(link.google_email)
        .bind(link.encrypted_access_token)
        .bind(link.encrypted_refresh_token)
        .bind(link.access_token_expires_at)
        .bind(link.scope)
        .fetch_one(pool)
        .await?;

        Ok(link)
    }

    pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>> {
        let link = sqlx::query_as::<_, GoogleLink>("SELECT * FROM google_links WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(link)
    }

    pub async fn update_access_token(
        &self,
        pool: &PgPool,
        encrypted_access_token: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        let link = sqlx::query_as::<_, GoogleLink>(
            r"
            UPDATE google_links
            SET encrypted_access_token = $2, access_token_expires_at = $3, updated_at = now()
            WHERE user_id = $1
            RETURNING *
            ",
        )
        .bind(self.user_id)
        .bind(encrypted_access_token)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        Ok(link)
    }

    pub async fn delete(pool: &PgPool, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM google_links WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
