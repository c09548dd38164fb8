use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::Context as _;
use db::recipes::Recipe;
use kitchen::{
    ingredient::scale_ingredients,
    recipe::{markdown_filename, to_markdown, Access, RecipeDraft},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    http_server::{
        errors::{OrNotFound as _, WithStatus as _},
        session::CurrentUser,
        ResponseResult, ServerError,
    },
    AppState,
};

#[derive(Debug, Serialize)]
pub(crate) struct RecipeView {
    #[serde(flatten)]
    recipe: Recipe,
    access: Access,
}

fn access(recipe: &Recipe, current: &CurrentUser) -> Access {
    Access::for_viewer(
        recipe.ownership(),
        current.user_id(),
        Some(current.household_id()),
    )
}

impl RecipeView {
    fn new(recipe: Recipe, current: &CurrentUser) -> Self {
        let access = access(&recipe, current);
        Self { recipe, access }
    }
}

/// 404 when missing, 403 when it exists but the viewer's access falls short of `needed`.
fn require_access(
    recipe: Option<Recipe>,
    viewer_id: Uuid,
    viewer_household: Uuid,
    needed: Access,
) -> ResponseResult<Recipe> {
    let recipe = recipe.or_not_found("Recipe")?;

    if Access::for_viewer(recipe.ownership(), viewer_id, Some(viewer_household)) < needed {
        return Err(ServerError::forbidden());
    }

    Ok(recipe)
}

pub(crate) async fn viewable_recipe(
    state: &AppState,
    current: &CurrentUser,
    recipe_id: Uuid,
) -> ResponseResult<Recipe> {
    let recipe = Recipe::get_by_id(&state.db, recipe_id).await?;
    require_access(recipe, current.user_id(), current.household_id(), Access::View)
}

async fn owned_recipe(
    state: &AppState,
    current: &CurrentUser,
    recipe_id: Uuid,
) -> ResponseResult<Recipe> {
    let recipe = Recipe::get_by_id(&state.db, recipe_id).await?;
    require_access(recipe, current.user_id(), current.household_id(), Access::Edit)
}

fn validated(draft: RecipeDraft) -> ResponseResult<RecipeDraft> {
    draft.validate().with_status(StatusCode::BAD_REQUEST)
}

pub(crate) async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<Vec<RecipeView>>> {
    let recipes = Recipe::list_visible(&state.db, current.user_id(), current.household_id())
        .await
        .context("Failed to list recipes")?;

    Ok(Json(
        recipes
            .into_iter()
            .map(|r| RecipeView::new(r, &current))
            .collect(),
    ))
}

#[tracing::instrument(skip_all, fields(user_id = %current.user_id()))]
pub(crate) async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<RecipeDraft>,
) -> ResponseResult<impl IntoResponse> {
    let draft = validated(draft)?;

    let recipe = Recipe::create(&state.db, current.user_id(), current.household_id(), &draft).await?;

    Ok((StatusCode::CREATED, Json(RecipeView::new(recipe, &current))))
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> ResponseResult<Json<RecipeView>> {
    let recipe = viewable_recipe(&state, &current, recipe_id).await?;

    Ok(Json(RecipeView::new(recipe, &current)))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(recipe_id): Path<Uuid>,
    Json(draft): Json<RecipeDraft>,
) -> ResponseResult<Json<RecipeView>> {
    let draft = validated(draft)?;
    let recipe = owned_recipe(&state, &current, recipe_id).await?;

    let recipe = recipe.update(&state.db, &draft).await?;

    Ok(Json(RecipeView::new(recipe, &current)))
}

pub(crate) async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> ResponseResult<StatusCode> {
    let recipe = owned_recipe(&state, &current, recipe_id).await?;

    recipe.delete(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScaleQuery {
    servings: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScaledRecipe {
    recipe_id: Uuid,
    base_servings: i32,
    servings: f64,
    ingredients: Vec<String>,
}

pub(crate) async fn scaled(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(recipe_id): Path<Uuid>,
    Query(query): Query<ScaleQuery>,
) -> ResponseResult<Json<ScaledRecipe>> {
    let recipe = viewable_recipe(&state, &current, recipe_id).await?;

    let base_servings = match recipe.servings {
        Some(servings) => servings,
        None => {
            db::settings::get(&state.db, current.user_id())
                .await?
                .default_servings
        }
    };

    let ingredients = scale_ingredients(
        &recipe.ingredients,
        f64::from(base_servings),
        query.servings,
    )
    .with_status(StatusCode::BAD_REQUEST)?;

    Ok(Json(ScaledRecipe {
        recipe_id,
        base_servings,
        servings: query.servings,
        ingredients,
    }))
}

pub(crate) async fn markdown(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> ResponseResult<impl IntoResponse> {
    let recipe = viewable_recipe(&state, &current, recipe_id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        markdown_filename(&recipe.title)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        to_markdown(&recipe.to_draft()),
    ))
}
