use chrono::{DateTime, Utc};
use color_eyre::Result;
use kitchen::recipe::{Ownership, RecipeDraft};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub household_id: Option<Uuid>,
    pub title: String,
    pub recipe_type: Option<String>,
    pub category: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub notes: Option<String>,
    pub is_public: bool,
    pub is_shared_with_household: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    pub fn ownership(&self) -> Ownership {
        Ownership {
            user_id: self.user_id,
            household_id: self.household_id,
            is_shared_with_household: self.is_shared_with_household,
            is_public: self.is_public,
        }
    }

    pub fn to_draft(&self) -> RecipeDraft {
        RecipeDraft {
            title: self.title.clone(),
            recipe_type: self.recipe_type.clone(),
            category: self.category.clone(),
            prep_time: self.prep_time.clone(),
            cook_time: self.cook_time.clone(),
            servings: self.servings,
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            tags: self.tags.clone(),
            source_url: self.source_url.clone(),
            notes: self.notes.clone(),
            is_public: self.is_public,
            is_shared_with_household: self.is_shared_with_household,
        }
    }

    #[tracing::instrument(skip(pool, draft), fields(title = %draft.title))]
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        household_id: Uuid,
        draft: &RecipeDraft,
    ) -> Result<Self> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r"
            INSERT INTO recipes (
                user_id, household_id, title, recipe_type, category, prep_time, cook_time,
                servings, ingredients, instructions, tags, source_url, notes, is_public,
                is_shared_with_household
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(household_id)
        .bind(&draft.title)
        .bind(&draft.recipe_type)
        .bind(&draft.category)
        .bind(&draft.prep_time)
        .bind(&draft.cook_time)
        .bind(draft.servings)
        .bind(&draft.ingredients)
        .bind(&draft.instructions)
        .bind(&draft.tags)
        .bind(&draft.source_url)
        .bind(&draft.notes)
        .bind(draft.is_public)
        .bind(draft.is_shared_with_household)
        .fetch_one(pool)
        .await?;

        Ok(recipe)
    }

    /// Replaces every editable field.
    pub async fn update(&self, pool: &PgPool, draft: &RecipeDraft) -> Result<Self> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r"
            UPDATE recipes
            SET title = $2, recipe_type = $3, category = $4, prep_time = $5, cook_time = $6,
                servings = $7, ingredients = $8, instructions = $9, tags = $10,
                source_url = $11, notes = $12, is_public = $13,
                is_shared_with_household = $14, updated_at = now()
            WHERE recipe_id = $1
            RETURNING *
            ",
        )
        .bind(self.recipe_id)
        .bind(&draft.title)
        .bind(&draft.recipe_type)
        .bind(&draft.category)
        .bind(&draft.prep_time)
        .bind(&draft.cook_time)
        .bind(draft.servings)
        .bind(&draft.ingredients)
        .bind(&draft.instructions)
        .bind(&draft.tags)
        .bind(&draft.source_url)
        .bind(&draft.notes)
        .bind(draft.is_public)
        .bind(draft.is_shared_with_household)
        .fetch_one(pool)
        .await?;

        Ok(recipe)
    }

    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM recipes WHERE recipe_id = $1")
            .bind(self.recipe_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn get_by_id(pool: &PgPool, recipe_id: Uuid) -> Result<Option<Self>> {
        let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE recipe_id = $1")
            .bind(recipe_id)
            .fetch_optional(pool)
            .await?;

        Ok(recipe)
    }

    /// The viewer's own recipes plus anything shared into their household,
    /// newest first.
    pub async fn list_visible(pool: &PgPool, user_id: Uuid, household_id: Uuid) -> Result<Vec<Self>> {
        let recipes = sqlx::query_as::<_, Recipe>(
            r"
            SELECT * FROM recipes
            WHERE user_id = $1
               OR (household_id = $2 AND is_shared_with_household)
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .bind(household_id)
        .fetch_all(pool)
        .await?;

        Ok(recipes)
    }

    pub async fn get_many(pool: &PgPool, recipe_ids: &[Uuid]) -> Result<Vec<Self>> {
        let recipes =
            sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE recipe_id = ANY($1)")
                .bind(recipe_ids)
                .fetch_all(pool)
                .await?;

        Ok(recipes)
    }
}
