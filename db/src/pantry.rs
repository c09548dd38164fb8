use chrono::{DateTime, Utc};
use color_eyre::{eyre::Context as _, Result};
use kitchen::{
    aisle::{categorize, Aisle},
    ingredient::normalize_ingredient_name,
    pantry::PantrySource,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PantryItem {
    pub pantry_item_id: Uuid,
    pub household_id: Uuid,
    pub ingredient: String,
    pub normalized_name: String,
    pub category: Aisle,
    pub source: PantrySource,
    pub last_restocked: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPantryItem {
    pub ingredient: String,
    #[serde(default)]
    pub category: Option<Aisle>,
    #[serde(default)]
    pub source: Option<PantrySource>,
}

async fn upsert_one<'e>(
    executor: impl PgExecutor<'e>,
    household_id: Uuid,
    item: &NewPantryItem,
) -> Result<PantryItem> {
    let ingredient = item.ingredient.trim();
    let category = item.category.unwrap_or_else(|| categorize(ingredient));

    let row = sqlx::query_as::<_, PantryItem>(
        r"
        INSERT INTO pantry_items (household_id, ingredient, normalized_name, category, source)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (household_id, normalized_name)
        DO UPDATE SET ingredient = EXCLUDED.ingredient,
                      category = EXCLUDED.category,
                      source = EXCLUDED.source,
                      last_restocked = now()
        RETURNING *
        ",
    )
    .bind(household_id)
    .bind(ingredient)
    .bind(normalize_ingredient_name(ingredient))
    .bind(category)
    .bind(item.source.unwrap_or(PantrySource::Manual))
    .fetch_one(executor)
    .await?;

    Ok(row)
}

impl PantryItem {
    pub async fn list(pool: &PgPool, household_id: Uuid) -> Result<Vec<Self>> {
        let items = sqlx::query_as::<_, PantryItem>(
            "SELECT * FROM pantry_items WHERE household_id = $1 ORDER BY category, normalized_name",
        )
        .bind(household_id)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Adding something already in the pantry refreshes its restock time.
    #[tracing::instrument(skip(pool, item), fields(ingredient = %item.ingredient))]
    pub async fn upsert(pool: &PgPool, household_id: Uuid, item: &NewPantryItem) -> Result<Self> {
        upsert_one(pool, household_id, item).await
    }

    /// All or nothing.
    #[tracing::instrument(skip(pool, items), fields(count = items.len()))]
    pub async fn upsert_many(
        pool: &PgPool,
        household_id: Uuid,
        items: &[NewPantryItem],
    ) -> Result<Vec<Self>> {
        let mut tx = pool.begin().await?;
        let mut saved = Vec::with_capacity(items.len());

        for item in items {
            let row = upsert_one(&mut *tx, household_id, item)
                .await
                .wrap_err_with(|| format!("Failed to save pantry item {}", item.ingredient))?;
            saved.push(row);
        }

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn delete_for_household(
        pool: &PgPool,
        pantry_item_id: Uuid,
        household_id: Uuid,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM pantry_items WHERE pantry_item_id = $1 AND household_id = $2")
                .bind(pantry_item_id)
                .bind(household_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn names(pool: &PgPool, household_id: Uuid) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT normalized_name FROM pantry_items WHERE household_id = $1",
        )
        .bind(household_id)
        .fetch_all(pool)
        .await?;

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_user;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn adding_twice_restocks(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        let eggs = NewPantryItem {
            ingredient: "Eggs".to_string(),
            category: None,
            source: None,
        };

        let first = PantryItem::upsert(&pool, user.household_id, &eggs).await?;
        assert_eq!(first.category, Aisle::DairyEggs);

        let second = PantryItem::upsert(&pool, user.household_id, &eggs).await?;
        assert_eq!(first.pantry_item_id, second.pantry_item_id);
        assert!(second.last_restocked >= first.last_restocked);

        let more = PantryItem::upsert_many(
            &pool,
            user.household_id,
            &[
                NewPantryItem {
                    ingredient: "Rice".to_string(),
                    category: Some(Aisle::Pantry),
                    source: Some(PantrySource::Scan),
                },
                eggs,
            ],
        )
        .await?;
        assert_eq!(more.len(), 2);
        assert_eq!(PantryItem::list(&pool, user.household_id).await?.len(), 2);

        assert!(PantryItem::delete_for_household(&pool, first.pantry_item_id, user.household_id).await?);
        assert_eq!(PantryItem::names(&pool, user.household_id).await?, vec!["rice".to_string()]);

        Ok(())
    }
}
