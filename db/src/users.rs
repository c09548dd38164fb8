use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub household_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[tracing::instrument(skip(pool, password_hash))]
    pub async fn create(
        pool: &PgPool,
        email: &str,
        display_name: Option<&str>,
        password_hash: &str,
        household_id: Uuid,
    ) -> Result<Self> {
        let user = sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (email, display_name, password_hash, household_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(email.trim().to_lowercase())
        .bind(display_name)
        .bind(password_hash)
        .bind(household_id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    /// Moves the user, and the recipes they own, into another household.
    #[tracing::instrument(skip(self, pool), fields(user_id = %self.user_id))]
    pub async fn move_to_household(&self, pool: &PgPool, household_id: Uuid) -> Result<Self> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r"
            UPDATE users
            SET household_id = $2, updated_at = now()
            WHERE user_id = $1
            RETURNING *
            ",
        )
        .bind(self.user_id)
        .bind(household_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE recipes SET household_id = $2 WHERE user_id = $1")
            .bind(self.user_id)
            .bind(household_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::households::Household;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn emails_are_case_insensitive(pool: PgPool) -> Result<()> {
        let home = Household::create(&pool, "Home").await?;
        let user = User::create(&pool, " Sam@Example.com ", Some("Sam"), "hash", home.household_id).await?;

        assert_eq!(user.email, "sam@example.com");

        let found = User::find_by_email(&pool, "SAM@example.COM").await?.unwrap();
        assert_eq!(found.user_id, user.user_id);

        let away = Household::create(&pool, "Away").await?;
        let moved = user.move_to_household(&pool, away.household_id).await?;
        assert_eq!(moved.household_id, away.household_id);
        assert_eq!(away.members(&pool).await?.len(), 1);
        assert!(home.members(&pool).await?.is_empty());

        Ok(())
    }
}
