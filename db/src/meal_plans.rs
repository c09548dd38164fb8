use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::{eyre::Context as _, Result};
use kitchen::{
    template::TemplateAssignment,
    week::{week_start_for, DayOfWeek, MealType},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealPlan {
    pub meal_plan_id: Uuid,
    pub household_id: Uuid,
    pub week_start: NaiveDate,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MealPlan {
    /// Plans are created lazily the first time a week is touched.
    #[tracing::instrument(skip(pool))]
    pub async fn get_or_create(pool: &PgPool, household_id: Uuid, week: NaiveDate) -> Result<Self> {
        let plan = sqlx::query_as::<_, MealPlan>(
            r"
            INSERT INTO meal_plans (household_id, week_start)
            VALUES ($1, $2)
            ON CONFLICT (household_id, week_start)
            DO UPDATE SET week_start = EXCLUDED.week_start
            RETURNING *
            ",
        )
        .bind(household_id)
        .bind(week_start_for(week))
        .fetch_one(pool)
        .await?;

        Ok(plan)
    }

    pub async fn find(pool: &PgPool, household_id: Uuid, week: NaiveDate) -> Result<Option<Self>> {
        let plan = sqlx::query_as::<_, MealPlan>(
            "SELECT * FROM meal_plans WHERE household_id = $1 AND week_start = $2",
        )
        .bind(household_id)
        .bind(week_start_for(week))
        .fetch_optional(pool)
        .await?;

        Ok(plan)
    }

    pub async fn list_sent(pool: &PgPool, household_id: Uuid) -> Result<Vec<Self>> {
        let plans = sqlx::query_as::<_, MealPlan>(
            r"
            SELECT * FROM meal_plans
            WHERE household_id = $1 AND sent_at IS NOT NULL
            ORDER BY week_start DESC
            ",
        )
        .bind(household_id)
        .fetch_all(pool)
        .await?;

        Ok(plans)
    }

    pub async fn mark_sent(&self, pool: &PgPool) -> Result<Self> {
        let plan = sqlx::query_as::<_, MealPlan>(
            "UPDATE meal_plans SET sent_at = now() WHERE meal_plan_id = $1 RETURNING *",
        )
        .bind(self.meal_plan_id)
        .fetch_one(pool)
        .await?;

        Ok(plan)
    }

    /// Removes every assignment in the week, returning how many there were.
    pub async fn clear(&self, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM meal_assignments WHERE meal_plan_id = $1")
            .bind(self.meal_plan_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Swaps the week's assignments for `fields` in one transaction, so a failed
    /// insert leaves the week as it was.
    #[tracing::instrument(skip_all, fields(meal_plan_id = %self.meal_plan_id, count = fields.len()))]
    pub async fn replace_assignments(
        &self,
        pool: &PgPool,
        fields: &[AssignmentFields],
    ) -> Result<Vec<MealAssignment>> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM meal_assignments WHERE meal_plan_id = $1")
            .bind(self.meal_plan_id)
            .execute(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(fields.len());
        for slot in fields {
            let assignment = insert_assignment(&mut *tx, self.meal_plan_id, slot)
                .await
                .wrap_err_with(|| format!("Failed to assign recipe {}", slot.recipe_id))?;
            created.push(assignment);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Adds `fields` after whatever the week already holds.
    pub async fn append_assignments(
        &self,
        pool: &PgPool,
        fields: &[AssignmentFields],
    ) -> Result<Vec<MealAssignment>> {
        let mut tx = pool.begin().await?;

        let mut created = Vec::with_capacity(fields.len());
        for slot in fields {
            created.push(insert_assignment(&mut *tx, self.meal_plan_id, slot).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn clear_day(&self, pool: &PgPool, day: DayOfWeek) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM meal_assignments WHERE meal_plan_id = $1 AND day_of_week = $2",
        )
        .bind(self.meal_plan_id)
        .bind(day)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Assignments joined with the recipe fields the week views need.
    pub async fn assignments(&self, pool: &PgPool) -> Result<Vec<PlannedAssignment>> {
        let planned = sqlx::query_as::<_, PlannedAssignment>(
            r"
            SELECT a.*, r.title, r.prep_time, r.cook_time, r.servings, r.ingredients,
                   r.instructions, r.source_url
            FROM meal_assignments a
            JOIN recipes r ON r.recipe_id = a.recipe_id
            WHERE a.meal_plan_id = $1
            ORDER BY a.created_at
            ",
        )
        .bind(self.meal_plan_id)
        .fetch_all(pool)
        .await?;

        Ok(planned)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealAssignment {
    pub assignment_id: Uuid,
    pub meal_plan_id: Uuid,
    pub recipe_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub cook: Option<String>,
    pub meal_type: Option<MealType>,
    pub serving_size: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentFields {
    pub recipe_id: Uuid,
    pub day_of_week: DayOfWeek,
    #[serde(default)]
    pub cook: Option<String>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    #[serde(default)]
    pub serving_size: Option<i32>,
}

async fn insert_assignment<'e>(
    executor: impl PgExecutor<'e>,
    meal_plan_id: Uuid,
    fields: &AssignmentFields,
) -> Result<MealAssignment> {
    let assignment = sqlx::query_as::<_, MealAssignment>(
        r"
        INSERT INTO meal_assignments
            (meal_plan_id, recipe_id, day_of_week, cook, meal_type, serving_size)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(meal_plan_id)
    .bind(fields.recipe_id)
    .bind(fields.day_of_week)
    .bind(&fields.cook)
    .bind(fields.meal_type)
    .bind(fields.serving_size)
    .fetch_one(executor)
    .await?;

    Ok(assignment)
}

impl From<&TemplateAssignment> for AssignmentFields {
    fn from(slot: &TemplateAssignment) -> Self {
        Self {
            recipe_id: slot.recipe_id,
            day_of_week: slot.day_of_week,
            cook: slot.cook.clone(),
            meal_type: slot.meal_type,
            serving_size: slot.serving_size,
        }
    }
}

impl MealAssignment {
    /// The parts of an assignment a template or a copied week carries over.
    pub fn slot(&self) -> TemplateAssignment {
        TemplateAssignment {
            recipe_id: self.recipe_id,
            day_of_week: self.day_of_week,
            cook: self.cook.clone(),
            meal_type: self.meal_type,
            serving_size: self.serving_size,
        }
    }

    pub async fn create(pool: &PgPool, plan: &MealPlan, fields: &AssignmentFields) -> Result<Self> {
        insert_assignment(pool, plan.meal_plan_id, fields).await
    }

    /// Only finds assignments that belong to one of the household's plans.
    pub async fn get_for_household(
        pool: &PgPool,
        assignment_id: Uuid,
        household_id: Uuid,
    ) -> Result<Option<Self>> {
        let assignment = sqlx::query_as::<_, MealAssignment>(
            r"
            SELECT a.* FROM meal_assignments a
            JOIN meal_plans p ON p.meal_plan_id = a.meal_plan_id
            WHERE a.assignment_id = $1 AND p.household_id = $2
            ",
        )
        .bind(assignment_id)
        .bind(household_id)
        .fetch_optional(pool)
        .await?;

        Ok(assignment)
    }

    pub async fn update(&self, pool: &PgPool, fields: &AssignmentFields) -> Result<Self> {
        let assignment = sqlx::query_as::<_, MealAssignment>(
            r"
            UPDATE meal_assignments
            SET recipe_id = $2, day_of_week = $3, cook = $4, meal_type = $5, serving_size = $6
            WHERE assignment_id = $1
            RETURNING *
            ",
        )
        .bind(self.assignment_id)
        .bind(fields.recipe_id)
        .bind(fields.day_of_week)
        .bind(&fields.cook)
        .bind(fields.meal_type)
        .bind(fields.serving_size)
        .fetch_one(pool)
        .await?;

        Ok(assignment)
    }

    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM meal_assignments WHERE assignment_id = $1")
            .bind(self.assignment_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlannedAssignment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub assignment: MealAssignment,
    pub title: String,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeekRecipe {
    pub week_start: NaiveDate,
    pub recipe_id: Uuid,
    pub title: String,
}

/// Every recipe planned in any of `weeks`, for spotting repeats.
pub async fn recipes_in_weeks(
    pool: &PgPool,
    household_id: Uuid,
    weeks: &[NaiveDate],
) -> Result<Vec<WeekRecipe>> {
    let weeks: Vec<NaiveDate> = weeks.iter().copied().map(week_start_for).collect();

    let rows = sqlx::query_as::<_, WeekRecipe>(
        r"
        SELECT p.week_start, a.recipe_id, r.title
        FROM meal_assignments a
        JOIN meal_plans p ON p.meal_plan_id = a.meal_plan_id
        JOIN recipes r ON r.recipe_id = a.recipe_id
        WHERE p.household_id = $1 AND p.week_start = ANY($2)
        ORDER BY p.week_start, a.created_at
        ",
    )
    .bind(household_id)
    .bind(&weeks)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
