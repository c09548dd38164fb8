use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use color_eyre::eyre::Context as _;
use kitchen::settings::{self as kitchen_settings, Settings};

use crate::{
    http_server::{errors::WithStatus as _, session::CurrentUser, ResponseResult},
    AppState,
};

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<Settings>> {
    Ok(Json(db::settings::get(&state.db, current.user_id()).await?))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(settings): Json<Settings>,
) -> ResponseResult<Json<Settings>> {
    let settings = settings.validate().with_status(StatusCode::BAD_REQUEST)?;

    db::settings::save(&state.db, current.user_id(), &settings)
        .await
        .context("Failed to save settings")?;

    Ok(Json(settings))
}

pub(crate) async fn export(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<impl IntoResponse> {
    let settings = db::settings::get(&state.db, current.user_id()).await?;
    let now = Utc::now();

    let disposition = format!(
        "attachment; filename=\"meal-planner-settings-{}.json\"",
        now.format("%Y-%m-%d")
    );

    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(kitchen_settings::export(&settings, now)),
    ))
}

/// Takes a file produced by `export`, as the raw request body.
pub(crate) async fn import(
    State(state): State<AppState>,
    current: CurrentUser,
    body: String,
) -> ResponseResult<Json<Settings>> {
    let settings = kitchen_settings::import(&body).with_status(StatusCode::BAD_REQUEST)?;

    db::settings::save(&state.db, current.user_id(), &settings).await?;
    tracing::info!(user_id = %current.user_id(), "Imported settings");

    Ok(Json(settings))
}
