use std::collections::HashSet;

use chrono::NaiveDate;
use color_eyre::Result;
use kitchen::week::week_start_for;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn set_checked(
    pool: &PgPool,
    household_id: Uuid,
    week: NaiveDate,
    item_key: &str,
    checked: bool,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO shopping_list_checks (household_id, week_start, item_key, checked)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (household_id, week_start, item_key)
        DO UPDATE SET checked = EXCLUDED.checked, updated_at = now()
        ",
    )
    .bind(household_id)
    .bind(week_start_for(week))
    .bind(item_key)
    .bind(checked)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn checked_keys(pool: &PgPool, household_id: Uuid, week: NaiveDate) -> Result<HashSet<String>> {
    let keys = sqlx::query_scalar::<_, String>(
        r"
        SELECT item_key FROM shopping_list_checks
        WHERE household_id = $1 AND week_start = $2 AND checked
        ",
    )
    .bind(household_id)
    .bind(week_start_for(week))
    .fetch_all(pool)
    .await?;

    Ok(keys.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_user;

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn checks_toggle(pool: PgPool) -> Result<()> {
        let user = seed_user(&pool, "sam@example.com").await?;
        let week: NaiveDate = "2025-12-10".parse()?;

        set_checked(&pool, user.household_id, week, "onion", true).await?;
        set_checked(&pool, user.household_id, week, "milk", true).await?;
        set_checked(&pool, user.household_id, week, "milk", false).await?;

        let monday: NaiveDate = "2025-12-08".parse()?;
        let keys = checked_keys(&pool, user.household_id, monday).await?;
        assert_eq!(keys, HashSet::from(["onion".to_string()]));

        Ok(())
    }
}
