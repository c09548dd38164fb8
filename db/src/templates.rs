use chrono::{DateTime, Utc};
use color_eyre::Result;
use kitchen::template::TemplateAssignment;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealTemplate {
    pub template_id: Uuid,
    pub household_id: Uuid,
    pub name: String,
    pub assignments: Json<Vec<TemplateAssignment>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MealTemplate {
    pub async fn create(
        pool: &PgPool,
        household_id: Uuid,
        name: &str,
        assignments: Vec<TemplateAssignment>,
    ) -> Result<Self> {
        let template = sqlx::query_as::<_, MealTemplate>(
            r"
            INSERT INTO meal_templates (household_id, name, assignments)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(household_id)
        .bind(name)
        .bind(Json(assignments))
        .fetch_one(pool)
        .await?;

        Ok(template)
    }

    pub async fn list(pool: &PgPool, household_id: Uuid) -> Result<Vec<Self>> {
        let templates = sqlx::query_as::<_, MealTemplate>(
            "SELECT * FROM meal_templates WHERE household_id = $1 ORDER BY name",
        )
        .bind(household_id)
        .fetch_all(pool)
        .await?;

        Ok(templates)
    }

    pub async fn get_for_household(
        pool: &PgPool,
        template_id: Uuid,
        household_id: Uuid,
    ) -> Result<Option<Self>> {
        let template = sqlx::query_as::<_, MealTemplate>(
            "SELECT * FROM meal_templates WHERE template_id = $1 AND household_id = $2",
        )
        .bind(template_id)
        .bind(household_id)
        .fetch_optional(pool)
        .await?;

        Ok(template)
    }

    pub async fn update(
        &self,
        pool: &PgPool,
        name: &str,
        assignments: Vec<TemplateAssignment>,
    ) -> Result<Self> {
        let template = sqlx::query_as::<_, MealTemplate>(
            r"
            UPDATE meal_templates
            SET name = $2, assignments = $3, updated_at = now()
            WHERE template_id = $1
            RETURNING *
            ",
        )
        .bind(self.template_id)
        .bind(name)
        .bind(Json(assignments))
        .fetch_one(pool)
        .await?;

        Ok(template)
    }

    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM meal_templates WHERE template_id = $1")
            .bind(self.template_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
