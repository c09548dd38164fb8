use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use db::{
    meal_plans::{AssignmentFields, MealAssignment, MealPlan},
    recipes::Recipe,
    templates::MealTemplate,
};
use kitchen::{
    recipe::Access,
    template::{plan_apply, snapshot, validate_name, TemplateAssignment},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_week, plans::week_assignments};
use crate::{
    http_server::{
        errors::{OrNotFound as _, WithStatus as _},
        session::CurrentUser,
        ResponseResult,
    },
    AppState,
};

async fn household_template(
    state: &AppState,
    current: &CurrentUser,
    template_id: Uuid,
) -> ResponseResult<MealTemplate> {
    MealTemplate::get_for_household(&state.db, template_id, current.household_id())
        .await?
        .or_not_found("Template")
}

pub(crate) async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<Vec<MealTemplate>>> {
    Ok(Json(
        MealTemplate::list(&state.db, current.household_id()).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveWeek {
    name: String,
    week_start: String,
}

/// Saves the assignments of a week under a name.
pub(crate) async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<SaveWeek>,
) -> ResponseResult<impl IntoResponse> {
    let name = validate_name(&request.name).with_status(StatusCode::BAD_REQUEST)?;
    let week_start = parse_week(&request.week_start)?;

    let (_, assignments) = week_assignments(&state, current.household_id(), week_start).await?;
    let slots: Vec<TemplateAssignment> = assignments.iter().map(|a| a.assignment.slot()).collect();

    let template =
        MealTemplate::create(&state.db, current.household_id(), &name, snapshot(&slots)).await?;

    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateUpdate {
    name: Option<String>,
    assignments: Option<Vec<TemplateAssignment>>,
}

pub(crate) async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<Uuid>,
    Json(request): Json<TemplateUpdate>,
) -> ResponseResult<Json<MealTemplate>> {
    let template = household_template(&state, &current, template_id).await?;

    let name = match request.name {
        Some(name) => validate_name(&name).with_status(StatusCode::BAD_REQUEST)?,
        None => template.name.clone(),
    };
    let assignments = match request.assignments {
        Some(assignments) => snapshot(&assignments),
        None => template.assignments.0.clone(),
    };

    Ok(Json(template.update(&state.db, &name, assignments).await?))
}

pub(crate) async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<Uuid>,
) -> ResponseResult<StatusCode> {
    household_template(&state, &current, template_id)
        .await?
        .delete(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Applying always replaces the target week's assignments.
#[derive(Debug, Deserialize)]
pub(crate) struct ApplyRequest {
    week_start: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Applied {
    week_start: chrono::NaiveDate,
    applied: usize,
    /// Slots whose recipe was deleted or is no longer shared.
    skipped: usize,
    assignments: Vec<MealAssignment>,
}

#[tracing::instrument(skip_all, fields(template_id = %template_id))]
pub(crate) async fn apply(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<Uuid>,
    Json(request): Json<ApplyRequest>,
) -> ResponseResult<Json<Applied>> {
    let template = household_template(&state, &current, template_id).await?;
    let week_start = parse_week(&request.week_start)?;

    let recipe_ids: Vec<Uuid> = template.assignments.iter().map(|a| a.recipe_id).collect();
    let accessible: HashSet<Uuid> = Recipe::get_many(&state.db, &recipe_ids)
        .await?
        .into_iter()
        .filter(|r| {
            Access::for_viewer(
                r.ownership(),
                current.user_id(),
                Some(current.household_id()),
            )
            .can_view()
        })
        .map(|r| r.recipe_id)
        .collect();
    let application = plan_apply(&template.assignments, &accessible);

    let plan = MealPlan::get_or_create(&state.db, current.household_id(), week_start).await?;
    let fields: Vec<AssignmentFields> = application.slots.iter().map(AssignmentFields::from).collect();
    let assignments = plan.replace_assignments(&state.db, &fields).await?;

    tracing::info!(
        %week_start,
        applied = assignments.len(),
        skipped = application.skipped,
        "Applied template"
    );

    Ok(Json(Applied {
        week_start,
        applied: assignments.len(),
        skipped: application.skipped,
        assignments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_requests_only_name_the_week() {
        let request: ApplyRequest = serde_json::from_str(r#"{"week_start": "2025-12-10"}"#).unwrap();
        assert_eq!(request.week_start, "2025-12-10");

        // A leftover `replace` flag is ignored
        let request: ApplyRequest =
            serde_json::from_str(r#"{"week_start": "2025-12-10", "replace": false}"#).unwrap();
        assert_eq!(request.week_start, "2025-12-10");
    }
}
