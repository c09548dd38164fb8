use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use db::{
    pantry::{NewPantryItem, PantryItem},
    recipes::Recipe,
};
use kitchen::pantry::{
    suggest_recipes, CandidateRecipe, PantryLookup, PantrySource, RecipeSuggestion,
    SUGGESTION_LIMIT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    http_server::{
        errors::WithStatus as _, session::CurrentUser, ResponseResult, ServerError,
    },
    open_food_facts::{self, is_valid_barcode, Product},
    AppState,
};

fn check_item(item: &NewPantryItem) -> ResponseResult<()> {
    if item.ingredient.trim().is_empty() {
        return Err(ServerError::bad_request("Ingredient is required"));
    }

    Ok(())
}

pub(crate) async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<Vec<PantryItem>>> {
    Ok(Json(
        PantryItem::list(&state.db, current.household_id()).await?,
    ))
}

pub(crate) async fn add(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(item): Json<NewPantryItem>,
) -> ResponseResult<impl IntoResponse> {
    check_item(&item)?;

    let item = PantryItem::upsert(&state.db, current.household_id(), &item).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkAdd {
    items: Vec<NewPantryItem>,
}

pub(crate) async fn bulk_add(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<BulkAdd>,
) -> ResponseResult<impl IntoResponse> {
    if request.items.is_empty() {
        return Err(ServerError::bad_request("No items to add"));
    }
    for item in &request.items {
        check_item(item)?;
    }

    let items = PantryItem::upsert_many(&state.db, current.household_id(), &request.items).await?;

    Ok((StatusCode::CREATED, Json(items)))
}

pub(crate) async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(pantry_item_id): Path<Uuid>,
) -> ResponseResult<StatusCode> {
    if !PantryItem::delete_for_household(&state.db, pantry_item_id, current.household_id()).await?
    {
        return Err(ServerError::not_found("Pantry item"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Visible recipes ranked by how much of them the pantry, plus `also_on_hand`, covers.
pub(crate) async fn pantry_suggestions(
    state: &AppState,
    current: &CurrentUser,
    also_on_hand: &[String],
    limit: usize,
) -> ResponseResult<Vec<RecipeSuggestion>> {
    let mut names = PantryItem::names(&state.db, current.household_id()).await?;
    names.extend(also_on_hand.iter().cloned());
    let lookup = PantryLookup::new(names);
    if lookup.is_empty() {
        return Ok(Vec::new());
    }

    let candidates: Vec<CandidateRecipe> =
        Recipe::list_visible(&state.db, current.user_id(), current.household_id())
            .await?
            .into_iter()
            .map(|r| CandidateRecipe {
                recipe_id: r.recipe_id,
                title: r.title,
                prep_time: r.prep_time,
                cook_time: r.cook_time,
                ingredients: r.ingredients,
            })
            .collect();

    Ok(suggest_recipes(&lookup, &candidates, limit))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionQuery {
    limit: Option<usize>,
}

pub(crate) async fn suggestions(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<SuggestionQuery>,
) -> ResponseResult<Json<Vec<RecipeSuggestion>>> {
    let limit = query.limit.unwrap_or(SUGGESTION_LIMIT).clamp(1, 50);

    Ok(Json(pantry_suggestions(&state, &current, &[], limit).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BarcodeRequest {
    barcode: String,
    /// Also puts the product in the pantry when it is found.
    #[serde(default)]
    add_to_pantry: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct BarcodeResult {
    found: bool,
    product: Option<Product>,
    pantry_item: Option<PantryItem>,
}

#[tracing::instrument(skip_all, fields(barcode = %request.barcode))]
pub(crate) async fn barcode(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<BarcodeRequest>,
) -> ResponseResult<Json<BarcodeResult>> {
    let barcode = request.barcode.trim();
    if !is_valid_barcode(barcode) {
        return Err(ServerError::bad_request(format!("Invalid barcode {barcode}")));
    }

    let product = open_food_facts::lookup(&state.http, &state.food_facts, barcode)
        .await
        .with_status(StatusCode::BAD_GATEWAY)?;

    let pantry_item = match (&product, request.add_to_pantry) {
        (Some(Product { name: Some(name), .. }), true) => Some(
            PantryItem::upsert(
                &state.db,
                current.household_id(),
                &NewPantryItem {
                    ingredient: name.clone(),
                    category: None,
                    source: Some(PantrySource::Barcode),
                },
            )
            .await?,
        ),
        _ => None,
    };

    Ok(Json(BarcodeResult {
        found: product.is_some(),
        product,
        pantry_item,
    }))
}
