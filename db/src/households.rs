use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Household {
    pub household_id: Uuid,
    pub name: String,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

impl Household {
    /// Creates a household with a fresh 8 character invite code.
    #[tracing::instrument(skip(pool))]
    pub async fn create(pool: &PgPool, name: &str) -> Result<Self> {
        let household = sqlx::query_as::<_, Household>(
            r"
            INSERT INTO households (name, invite_code)
            VALUES ($1, upper(substr(md5(random()::text || clock_timestamp()::text), 1, 8)))
            RETURNING *
            ",
        )
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(household)
    }

    pub async fn get_by_id(pool: &PgPool, household_id: Uuid) -> Result<Option<Self>> {
        let household =
            sqlx::query_as::<_, Household>("SELECT * FROM households WHERE household_id = $1")
                .bind(household_id)
                .fetch_optional(pool)
                .await?;

        Ok(household)
    }

    pub async fn find_by_invite_code(pool: &PgPool, invite_code: &str) -> Result<Option<Self>> {
        let household =
            sqlx::query_as::<_, Household>("SELECT * FROM households WHERE invite_code = $1")
                .bind(invite_code.trim().to_uppercase())
                .fetch_optional(pool)
                .await?;

        Ok(household)
    }

    pub async fn members(&self, pool: &PgPool) -> Result<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r"
            SELECT user_id, email, display_name
            FROM users
            WHERE household_id = $1
            ORDER BY created_at
            ",
        )
        .bind(self.household_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn invite_codes(pool: PgPool) -> Result<()> {
        let household = Household::create(&pool, "Home").await?;

        assert_eq!(household.invite_code.len(), 8);

        let found = Household::find_by_invite_code(&pool, &household.invite_code.to_lowercase())
            .await?
            .unwrap();
        assert_eq!(found.household_id, household.household_id);
        assert!(Household::find_by_invite_code(&pool, "NOPE").await?.is_none());

        Ok(())
    }
}
