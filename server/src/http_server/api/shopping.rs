use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use color_eyre::eyre::Context as _;
use db::{
    meal_plans::MealPlan,
    pantry::PantryItem,
    shopping_checks,
    shopping_extras::{NewShoppingExtra, ShoppingExtra},
};
use kitchen::{
    pantry::PantryLookup,
    shopping::{self, GenerateOptions, PlannedRecipe, ShoppingList},
    week::format_week_range,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_week, plans::week_assignments};
use crate::{
    emailjs::{send_shopping_list, SendSummary, ShoppingListEmail},
    http_server::{errors::WithStatus as _, session::CurrentUser, ResponseResult, ServerError},
    AppState,
};

async fn build_list(
    state: &AppState,
    current: &CurrentUser,
    week_start: NaiveDate,
    include_pantry: bool,
) -> ResponseResult<ShoppingList> {
    let (_, assignments) = week_assignments(state, current.household_id(), week_start).await?;
    let settings = db::settings::get(&state.db, current.user_id()).await?;

    let pantry = if include_pantry {
        None
    } else {
        let names = PantryItem::names(&state.db, current.household_id())
            .await
            .context("Failed to load pantry")?;
        Some(PantryLookup::new(names))
    };

    let options = GenerateOptions {
        pantry,
        checked: shopping_checks::checked_keys(&state.db, current.household_id(), week_start)
            .await?,
        aisle_order: settings.category_order,
        extras: ShoppingExtra::list(&state.db, current.household_id(), week_start)
            .await?
            .iter()
            .map(ShoppingExtra::to_extra_item)
            .collect(),
    };

    let planned: Vec<PlannedRecipe> = assignments
        .into_iter()
        .map(|a| PlannedRecipe {
            recipe_id: a.assignment.recipe_id,
            title: a.title,
            ingredients: a.ingredients,
            base_servings: a.servings,
            serving_size: a.assignment.serving_size,
            day: a.assignment.day_of_week,
            cook: a.assignment.cook,
        })
        .collect();

    Ok(shopping::generate(&planned, &options))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ListFormat {
    #[default]
    Json,
    Markdown,
    Html,
    Text,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    format: ListFormat,
    /// Leaves pantry items on the list.
    #[serde(default)]
    include_pantry: bool,
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
    Query(query): Query<ListQuery>,
) -> ResponseResult<Response> {
    let week_start = parse_week(&week)?;
    let list = build_list(&state, &current, week_start, query.include_pantry).await?;
    let week_range = format_week_range(week_start);

    let response = match query.format {
        ListFormat::Json => Json(list).into_response(),
        ListFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            shopping::to_markdown(&list, &week_range),
        )
            .into_response(),
        ListFormat::Html => Html(shopping::to_html(&list, &week_range)).into_response(),
        ListFormat::Text => shopping::to_text(&list, &week_range).into_response(),
    };

    Ok(response)
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CheckItem {
    checked: bool,
}

pub(crate) async fn check_item(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((week, key)): Path<(String, String)>,
    Json(request): Json<CheckItem>,
) -> ResponseResult<Json<CheckItem>> {
    let week_start = parse_week(&week)?;

    shopping_checks::set_checked(
        &state.db,
        current.household_id(),
        week_start,
        &key,
        request.checked,
    )
    .await?;

    Ok(Json(request))
}

fn checked_extra(item: NewShoppingExtra) -> ResponseResult<NewShoppingExtra> {
    if item.ingredient.trim().is_empty() {
        return Err(ServerError::bad_request("Ingredient is required"));
    }

    Ok(item)
}

/// Adds an item by hand to the week's list.
pub(crate) async fn add_extra(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
    Json(request): Json<NewShoppingExtra>,
) -> ResponseResult<(StatusCode, Json<ShoppingExtra>)> {
    let week_start = parse_week(&week)?;
    let item = checked_extra(request)?;

    let extra = ShoppingExtra::create(&state.db, current.household_id(), week_start, &item).await?;
    tracing::info!(extra_item_id = %extra.extra_item_id, "Added shopping list item");

    Ok((StatusCode::CREATED, Json(extra)))
}

pub(crate) async fn remove_extra(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((week, id)): Path<(String, Uuid)>,
) -> ResponseResult<StatusCode> {
    parse_week(&week)?;

    if ShoppingExtra::delete_for_household(&state.db, id, current.household_id()).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::not_found("Shopping list item"))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Cleared {
    removed: u64,
}

/// Drops hand-added items that have been checked off.
pub(crate) async fn clear_checked(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<Json<Cleared>> {
    let week_start = parse_week(&week)?;
    let removed =
        ShoppingExtra::clear_checked(&state.db, current.household_id(), week_start).await?;

    Ok(Json(Cleared { removed }))
}

/// Emails the week's list to every configured recipient.
#[tracing::instrument(skip_all, fields(week = %week))]
pub(crate) async fn send(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<Json<SendSummary>> {
    let week_start = parse_week(&week)?;
    let settings = db::settings::get(&state.db, current.user_id()).await?;

    if !settings.email.is_configured() {
        return Err(ServerError::bad_request(
            "EmailJS is not configured, add the service id, template id and public key in settings",
        ));
    }
    if settings.email.recipients.is_empty() {
        return Err(ServerError::bad_request("No email recipients configured"));
    }

    let list = build_list(&state, &current, week_start, false).await?;
    let week_range = format_week_range(week_start);
    let email = ShoppingListEmail {
        schedule_table: shopping::schedule_table(&list.schedule).into_string(),
        shopping_list_html: shopping::sections_html(&list).into_string(),
        shopping_list_text: shopping::to_text(&list, &week_range),
        shopping_list_markdown: shopping::to_markdown(&list, &week_range),
        item_count: list.item_count,
        recipe_count: list.recipe_count,
        week_range,
    };

    let summary = send_shopping_list(
        &state.http,
        &state.emailjs,
        &settings.email,
        &settings.email.recipients,
        &email,
    )
    .await
    .with_status(StatusCode::BAD_GATEWAY)?;

    if summary.successful == 0 {
        let reasons: Vec<_> = summary.errors.iter().map(|e| e.error.as_str()).collect();
        return Err(ServerError::new(
            StatusCode::BAD_GATEWAY,
            format!("Failed to send shopping list: {}", reasons.join("; ")),
        ));
    }

    MealPlan::get_or_create(&state.db, current.household_id(), week_start)
        .await?
        .mark_sent(&state.db)
        .await?;

    Ok(Json(summary))
}
