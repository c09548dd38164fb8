use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use kitchen::{aisle::Aisle, shopping::ExtraItem, week::week_start_for};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// An item a household added to one week's shopping list by hand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShoppingExtra {
    pub extra_item_id: Uuid,
    pub household_id: Uuid,
    pub week_start: NaiveDate,
    pub ingredient: String,
    pub quantity: Option<String>,
    pub aisle: Option<Aisle>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShoppingExtra {
    pub ingredient: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub aisle: Option<Aisle>,
}

impl ShoppingExtra {
    pub async fn create(
        pool: &PgPool,
        household_id: Uuid,
        week: NaiveDate,
        item: &NewShoppingExtra,
    ) -> Result<Self> {
        let extra = sqlx::query_as::<_, ShoppingExtra>(
            r"
            INSERT INTO shopping_extra_items (household_id, week_start, ingredient, quantity, aisle)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(household_id)
        .bind(week_start_for(week))
        .bind(item.ingredient.trim())
        .bind(item.quantity.as_deref().map(str::trim).filter(|q| !q.is_empty()))
        .bind(item.aisle)
        .fetch_one(pool)
        .await?;

        Ok(extra)
    }

    pub async fn list(pool: &PgPool, household_id: Uuid, week: NaiveDate) -> Result<Vec<Self>> {
        let extras = sqlx::query_as::<_, ShoppingExtra>(
            r"
            SELECT * FROM shopping_extra_items
            WHERE household_id = $1 AND week_start = $2
            ORDER BY created_at
            ",
        )
        .bind(household_id)
        .bind(week_start_for(week))
        .fetch_all(pool)
        .await?;

        Ok(extras)
    }

    pub async fn delete_for_household(
        pool: &PgPool,
        extra_item_id: Uuid,
        household_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM shopping_extra_items WHERE extra_item_id = $1 AND household_id = $2",
        )
        .bind(extra_item_id)
        .bind(household_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops the week's hand-added items that have been checked off.
    #[tracing::instrument(skip(pool))]
    pub async fn clear_checked(pool: &PgPool, household_id: Uuid, week: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM shopping_extra_items e
            USING shopping_list_checks c
            WHERE e.household_id = $1
              AND e.week_start = $2
              AND c.household_id = e.household_id
              AND c.week_start = e.week_start
              AND c.item_key = 'extra-' || e.extra_item_id::text
              AND c.checked
            ",
        )
        .bind(household_id)
        .bind(week_start_for(week))
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub fn to_extra_item(&self) -> ExtraItem {
        ExtraItem {
            extra_item_id: self.extra_item_id,
            ingredient: self.ingredient.clone(),
            quantity: self.quantity.clone(),
            aisle: self.aisle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shopping_checks::set_checked, test_utils::seed_user};

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn checked_extras_can_be_cleared(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        let week: NaiveDate = "2025-12-10".parse()?;

        let foil = ShoppingExtra::create(
            &pool,
            user.household_id,
            week,
            &NewShoppingExtra {
                ingredient: " Foil ".to_string(),
                quantity: Some(" ".to_string()),
                aisle: Some(Aisle::Other),
            },
        )
        .await?;
        assert_eq!(foil.ingredient, "Foil");
        assert_eq!(foil.quantity, None);
        assert_eq!(foil.week_start, "2025-12-08".parse::<NaiveDate>()?);

        let milk = ShoppingExtra::create(
            &pool,
            user.household_id,
            week,
            &NewShoppingExtra {
                ingredient: "milk".to_string(),
                quantity: Some("1 gallon".to_string()),
                aisle: None,
            },
        )
        .await?;

        set_checked(&pool, user.household_id, week, &foil.to_extra_item().key(), true).await?;

        assert_eq!(ShoppingExtra::clear_checked(&pool, user.household_id, week).await?, 1);
        let left = ShoppingExtra::list(&pool, user.household_id, week).await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].extra_item_id, milk.extra_item_id);

        assert!(ShoppingExtra::delete_for_household(&pool, milk.extra_item_id, user.household_id).await?);
        assert!(!ShoppingExtra::delete_for_household(&pool, milk.extra_item_id, user.household_id).await?);

        Ok(())
    }
}
