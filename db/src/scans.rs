use chrono::{DateTime, Utc};
use color_eyre::Result;
use kitchen::pantry::{DetectedItem, RecipeSuggestion, ScanStatus, ScanType};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

/// Scans still `processing` after this long are considered abandoned.
pub const STALE_AFTER_MINUTES: i32 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PantryScan {
    pub scan_id: Uuid,
    pub household_id: Uuid,
    pub user_id: Uuid,
    pub scan_type: ScanType,
    pub image_ref: Option<String>,
    pub detected_items: Json<Vec<DetectedItem>>,
    pub suggested_recipes: Json<Vec<RecipeSuggestion>>,
    pub processing_status: ScanStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl PantryScan {
    pub async fn start(
        pool: &PgPool,
        household_id: Uuid,
        user_id: Uuid,
        scan_type: ScanType,
        image_ref: Option<&str>,
    ) -> Result<Self> {
        let scan = sqlx::query_as::<_, PantryScan>(
            r"
            INSERT INTO pantry_scans (household_id, user_id, scan_type, image_ref)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(household_id)
        .bind(user_id)
        .bind(scan_type)
        .bind(image_ref)
        .fetch_one(pool)
        .await?;

        Ok(scan)
    }

    pub async fn complete(
        &self,
        pool: &PgPool,
        detected: Vec<DetectedItem>,
        suggestions: Vec<RecipeSuggestion>,
    ) -> Result<Self> {
        let scan = sqlx::query_as::<_, PantryScan>(
            r"
            UPDATE pantry_scans
            SET processing_status = $2, detected_items = $3, suggested_recipes = $4,
                processed_at = now()
            WHERE scan_id = $1
            RETURNING *
            ",
        )
        .bind(self.scan_id)
        .bind(ScanStatus::Completed)
        .bind(Json(detected))
        .bind(Json(suggestions))
        .fetch_one(pool)
        .await?;

        Ok(scan)
    }

    pub async fn fail(&self, pool: &PgPool, message: &str) -> Result<Self> {
        let scan = sqlx::query_as::<_, PantryScan>(
            r"
            UPDATE pantry_scans
            SET processing_status = $2, error_message = $3, processed_at = now()
            WHERE scan_id = $1
            RETURNING *
            ",
        )
        .bind(self.scan_id)
        .bind(ScanStatus::Failed)
        .bind(message)
        .fetch_one(pool)
        .await?;

        Ok(scan)
    }

    pub async fn get_for_household(
        pool: &PgPool,
        scan_id: Uuid,
        household_id: Uuid,
    ) -> Result<Option<Self>> {
        let scan = sqlx::query_as::<_, PantryScan>(
            "SELECT * FROM pantry_scans WHERE scan_id = $1 AND household_id = $2",
        )
        .bind(scan_id)
        .bind(household_id)
        .fetch_optional(pool)
        .await?;

        Ok(scan)
    }

    pub async fn list(pool: &PgPool, household_id: Uuid, limit: i64) -> Result<Vec<Self>> {
        let scans = sqlx::query_as::<_, PantryScan>(
            r"
            SELECT * FROM pantry_scans
            WHERE household_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(household_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(scans)
    }

    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM pantry_scans WHERE scan_id = $1")
            .bind(self.scan_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Marks scans whose detection never finished as failed.
    #[tracing::instrument(skip(pool))]
    pub async fn fail_stale(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE pantry_scans
            SET processing_status = $1, error_message = 'Scan timed out', processed_at = now()
            WHERE processing_status = $2
              AND created_at < now() - make_interval(mins => $3)
            ",
        )
        .bind(ScanStatus::Failed)
        .bind(ScanStatus::Processing)
        .bind(STALE_AFTER_MINUTES)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
