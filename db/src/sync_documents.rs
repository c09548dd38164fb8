use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredDocument {
    pub doc_key: String,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

pub async fn get(pool: &PgPool, user_id: Uuid, doc_key: &str) -> Result<Option<StoredDocument>> {
    let doc = sqlx::query_as::<_, StoredDocument>(
        "SELECT doc_key, payload, updated_at FROM sync_documents WHERE user_id = $1 AND doc_key = $2",
    )
    .bind(user_id)
    .bind(doc_key)
    .fetch_optional(pool)
    .await?;

    Ok(doc)
}

/// Last writer wins: whatever arrives replaces what is stored.
pub async fn put(
    pool: &PgPool,
    user_id: Uuid,
    doc_key: &str,
    payload: &serde_json::Value,
) -> Result<StoredDocument> {
    let doc = sqlx::query_as::<_, StoredDocument>(
        r"
        INSERT INTO sync_documents (user_id, doc_key, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, doc_key)
        DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
        RETURNING doc_key, payload, updated_at
        ",
    )
    .bind(user_id)
    .bind(doc_key)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::seed_user;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn later_writes_replace_earlier(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        assert!(get(&pool, user.user_id, "plans").await?.is_none());

        let first = put(&pool, user.user_id, "plans", &json!({"weeks": 1})).await?;
        let second = put(&pool, user.user_id, "plans", &json!({"weeks": 2})).await?;

        assert!(second.updated_at >= first.updated_at);
        let stored = get(&pool, user.user_id, "plans").await?.unwrap();
        assert_eq!(stored.payload, json!({"weeks": 2}));

        Ok(())
    }
}
