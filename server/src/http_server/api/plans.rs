use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use color_eyre::eyre::Context as _;
use db::meal_plans::{recipes_in_weeks, AssignmentFields, MealAssignment, MealPlan, PlannedAssignment};
use kitchen::{
    template::{select_days, TemplateAssignment},
    week::{
        format_week_range, group_by_day, repetition_warnings, week_start_for, DayOfWeek, MealType,
        RepetitionWarning, WeekGrid,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_week, recipes::viewable_recipe};
use crate::{
    http_server::{errors::OrNotFound as _, session::CurrentUser, ResponseResult, ServerError},
    AppState,
};

/// How many weeks before the current one are checked for repeats by default.
const REPETITION_LOOKBACK_WEEKS: i64 = 3;

#[derive(Debug, Serialize)]
pub(crate) struct WeekPlan {
    week_start: NaiveDate,
    week_range: String,
    sent_at: Option<DateTime<Utc>>,
    days: WeekGrid<PlannedAssignment>,
}

pub(crate) async fn week_assignments(
    state: &AppState,
    household_id: Uuid,
    week_start: NaiveDate,
) -> ResponseResult<(Option<MealPlan>, Vec<PlannedAssignment>)> {
    let Some(plan) = MealPlan::find(&state.db, household_id, week_start).await? else {
        return Ok((None, Vec::new()));
    };

    let assignments = plan
        .assignments(&state.db)
        .await
        .context("Failed to load assignments")?;

    Ok((Some(plan), assignments))
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<Json<WeekPlan>> {
    let week_start = parse_week(&week)?;
    let (plan, assignments) = week_assignments(&state, current.household_id(), week_start).await?;

    Ok(Json(WeekPlan {
        week_start,
        week_range: format_week_range(week_start),
        sent_at: plan.and_then(|p| p.sent_at),
        days: group_by_day(assignments, |a| a.assignment.day_of_week),
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct Cleared {
    removed: u64,
}

pub(crate) async fn clear(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<Json<Cleared>> {
    let week_start = parse_week(&week)?;

    let removed = match MealPlan::find(&state.db, current.household_id(), week_start).await? {
        Some(plan) => plan.clear(&state.db).await?,
        None => 0,
    };

    Ok(Json(Cleared { removed }))
}

pub(crate) async fn clear_day(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((week, day)): Path<(String, String)>,
) -> ResponseResult<Json<Cleared>> {
    let week_start = parse_week(&week)?;
    let day: DayOfWeek = day.parse().map_err(ServerError::bad_request)?;

    let removed = match MealPlan::find(&state.db, current.household_id(), week_start).await? {
        Some(plan) => plan.clear_day(&state.db, day).await?,
        None => 0,
    };

    Ok(Json(Cleared { removed }))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CopyWeek {
    /// Week to copy from, the one before by default.
    from_week: Option<String>,
    /// Only these days, every day by default.
    days: Option<Vec<DayOfWeek>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Copied {
    from_week: NaiveDate,
    week_start: NaiveDate,
    copied: usize,
    assignments: Vec<MealAssignment>,
}

fn source_week(target: NaiveDate, from: Option<&str>) -> ResponseResult<NaiveDate> {
    let source = match from {
        Some(raw) => parse_week(raw)?,
        None => target - Duration::weeks(1),
    };

    if source == target {
        return Err(ServerError::bad_request("Can't copy a week onto itself"));
    }

    Ok(source)
}

/// Adds another week's meals to this one, keeping what is already planned.
#[tracing::instrument(skip_all, fields(week = %week))]
pub(crate) async fn copy_week(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
    request: Option<Json<CopyWeek>>,
) -> ResponseResult<impl IntoResponse> {
    let week_start = parse_week(&week)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let from_week = source_week(week_start, request.from_week.as_deref())?;

    let (source, assignments) = week_assignments(&state, current.household_id(), from_week).await?;
    source.or_not_found("Meal plan for the source week")?;

    let week: Vec<TemplateAssignment> = assignments.iter().map(|a| a.assignment.slot()).collect();
    let slots = select_days(&week, request.days.as_deref());
    if slots.is_empty() {
        return Err(ServerError::bad_request("No meals to copy"));
    }

    let plan = MealPlan::get_or_create(&state.db, current.household_id(), week_start).await?;
    let fields: Vec<AssignmentFields> = slots.iter().map(AssignmentFields::from).collect();
    let assignments = plan.append_assignments(&state.db, &fields).await?;

    tracing::info!(%from_week, copied = assignments.len(), "Copied week");

    Ok((
        StatusCode::CREATED,
        Json(Copied {
            from_week,
            week_start,
            copied: assignments.len(),
            assignments,
        }),
    ))
}

fn tidy(mut fields: AssignmentFields) -> ResponseResult<AssignmentFields> {
    if let Some(serving_size) = fields.serving_size {
        if serving_size <= 0 {
            return Err(ServerError::bad_request(format!(
                "Serving size must be greater than zero, got {serving_size}"
            )));
        }
    }

    fields.cook = fields
        .cook
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(fields)
}

#[tracing::instrument(skip_all, fields(week = %week))]
pub(crate) async fn assign(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
    Json(fields): Json<AssignmentFields>,
) -> ResponseResult<impl IntoResponse> {
    let week_start = parse_week(&week)?;
    let fields = tidy(fields)?;
    viewable_recipe(&state, &current, fields.recipe_id).await?;

    let plan = MealPlan::get_or_create(&state.db, current.household_id(), week_start).await?;
    let assignment = MealAssignment::create(&state.db, &plan, &fields).await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssignmentPatch {
    recipe_id: Option<Uuid>,
    day_of_week: Option<DayOfWeek>,
    /// An empty string clears the cook.
    cook: Option<String>,
    meal_type: Option<MealType>,
    serving_size: Option<i32>,
}

impl AssignmentPatch {
    fn apply_to(self, assignment: &MealAssignment) -> AssignmentFields {
        AssignmentFields {
            recipe_id: self.recipe_id.unwrap_or(assignment.recipe_id),
            day_of_week: self.day_of_week.unwrap_or(assignment.day_of_week),
            cook: self.cook.or_else(|| assignment.cook.clone()),
            meal_type: self.meal_type.or(assignment.meal_type),
            serving_size: self.serving_size.or(assignment.serving_size),
        }
    }
}

pub(crate) async fn update_assignment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(assignment_id): Path<Uuid>,
    Json(patch): Json<AssignmentPatch>,
) -> ResponseResult<Json<MealAssignment>> {
    let assignment =
        MealAssignment::get_for_household(&state.db, assignment_id, current.household_id())
            .await?
            .or_not_found("Assignment")?;

    let fields = tidy(patch.apply_to(&assignment))?;
    if fields.recipe_id != assignment.recipe_id {
        viewable_recipe(&state, &current, fields.recipe_id).await?;
    }

    Ok(Json(assignment.update(&state.db, &fields).await?))
}

pub(crate) async fn remove_assignment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(assignment_id): Path<Uuid>,
) -> ResponseResult<StatusCode> {
    let assignment =
        MealAssignment::get_for_household(&state.db, assignment_id, current.household_id())
            .await?
            .or_not_found("Assignment")?;

    assignment.delete(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn mark_sent(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<Json<MealPlan>> {
    let week_start = parse_week(&week)?;
    let plan = MealPlan::get_or_create(&state.db, current.household_id(), week_start).await?;

    Ok(Json(plan.mark_sent(&state.db).await?))
}

pub(crate) async fn sent(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<Vec<MealPlan>>> {
    Ok(Json(
        MealPlan::list_sent(&state.db, current.household_id()).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepetitionQuery {
    /// Comma separated ISO dates.
    weeks: Option<String>,
}

fn weeks_to_check(raw: Option<&str>, today: NaiveDate) -> ResponseResult<Vec<NaiveDate>> {
    match raw.map(str::trim).filter(|w| !w.is_empty()) {
        Some(raw) => raw.split(',').map(|w| parse_week(w.trim())).collect(),
        None => {
            let current = week_start_for(today);
            Ok((0..=REPETITION_LOOKBACK_WEEKS)
                .map(|back| current - Duration::weeks(back))
                .collect())
        }
    }
}

pub(crate) async fn repetitions(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<RepetitionQuery>,
) -> ResponseResult<Json<Vec<RepetitionWarning>>> {
    let weeks = weeks_to_check(query.weeks.as_deref(), Utc::now().date_naive())?;

    let rows = recipes_in_weeks(&state.db, current.household_id(), &weeks).await?;

    let mut by_week: BTreeMap<NaiveDate, Vec<(Uuid, String)>> = BTreeMap::new();
    for row in rows {
        by_week
            .entry(row.week_start)
            .or_default()
            .push((row.recipe_id, row.title));
    }
    let by_week: Vec<_> = by_week.into_iter().collect();

    Ok(Json(repetition_warnings(&by_week)))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::*;
    use crate::http_server::test_helpers::{json_request, send, test_app};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn default_repetition_window() {
        let weeks = weeks_to_check(None, date("2025-12-11")).unwrap();

        assert_eq!(
            weeks,
            vec![
                date("2025-12-08"),
                date("2025-12-01"),
                date("2025-11-24"),
                date("2025-11-17")
            ]
        );
    }

    #[test]
    fn copies_come_from_the_week_before() {
        let target = date("2025-12-08");

        assert_eq!(source_week(target, None).unwrap(), date("2025-12-01"));
        assert_eq!(
            source_week(target, Some("2025-11-20")).unwrap(),
            date("2025-11-17")
        );

        let err = source_week(target, Some("2025-12-12")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(source_week(target, Some("someday")).is_err());
    }

    #[test]
    fn copy_body_is_optional() {
        let request: CopyWeek = serde_json::from_str(r#"{"days": ["Monday", "Friday"]}"#).unwrap();
        assert_eq!(
            request.days,
            Some(vec![DayOfWeek::Monday, DayOfWeek::Friday])
        );
        assert!(request.from_week.is_none());

        let request: CopyWeek = serde_json::from_str("{}").unwrap();
        assert!(request.days.is_none());
        assert!(request.from_week.is_none());
    }

    #[test]
    fn explicit_repetition_weeks() {
        let weeks = weeks_to_check(Some("2025-12-10, 2025-12-03"), date("2026-01-01")).unwrap();
        assert_eq!(weeks, vec![date("2025-12-08"), date("2025-12-01")]);

        assert!(weeks_to_check(Some("2025-12-10,soon"), date("2026-01-01")).is_err());
    }

    #[test]
    fn patches_keep_unset_fields() {
        let assignment = MealAssignment {
            assignment_id: Uuid::new_v4(),
            meal_plan_id: Uuid::new_v4(),
            recipe_id: Uuid::new_v4(),
            day_of_week: DayOfWeek::Monday,
            cook: Some("Sam".to_string()),
            meal_type: Some(MealType::Dinner),
            serving_size: Some(4),
            created_at: Utc::now(),
        };

        let moved = AssignmentPatch {
            day_of_week: Some(DayOfWeek::Friday),
            ..AssignmentPatch::default()
        }
        .apply_to(&assignment);
        assert_eq!(moved.day_of_week, DayOfWeek::Friday);
        assert_eq!(moved.cook.as_deref(), Some("Sam"));
        assert_eq!(moved.serving_size, Some(4));

        let cleared = tidy(
            AssignmentPatch {
                cook: Some(String::new()),
                ..AssignmentPatch::default()
            }
            .apply_to(&assignment),
        )
        .unwrap();
        assert_eq!(cleared.cook, None);

        let invalid = AssignmentPatch {
            serving_size: Some(0),
            ..AssignmentPatch::default()
        }
        .apply_to(&assignment);
        assert!(tidy(invalid).is_err());
    }

    #[tokio::test]
    async fn plans_need_a_session() {
        let (status, _) = send(
            &test_app(),
            json_request(Method::GET, "/api/plans/2025-12-08", &json!(null)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
