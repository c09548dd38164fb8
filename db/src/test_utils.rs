use color_eyre::Result;
use sqlx::PgPool;

use crate::{households::Household, users::User};

pub async fn seed_user(pool: &PgPool, email: &str) -> Result<User> {
    let household = Household::create(pool, "Test household").await?;
    User::create(pool, email, None, "not-a-real-hash", household.household_id).await
}
