use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use chrono::Utc;
use color_eyre::eyre::Context as _;
use db::google_links::{GoogleLink, NewGoogleLink};
use kitchen::calendar::{build_events, EventRecipe, PlannedMeal};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use super::parse_week;
use crate::{
    google::{self, GoogleConfig, InsertedEvent},
    http_server::{
        errors::WithStatus as _,
        session::CurrentUser,
        ResponseResult, ServerError,
    },
    AppState,
};

const OAUTH_STATE_COOKIE: &str = "google_oauth_state";
const CALLBACK_PATH: &str = "/api/calendar/google/callback";

fn google_config(state: &AppState) -> Result<&GoogleConfig, ServerError> {
    state.google.as_ref().ok_or_else(|| {
        ServerError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Google Calendar is not configured",
        )
    })
}

pub(crate) async fn connect(
    State(state): State<AppState>,
    _current: CurrentUser,
    cookies: Cookies,
) -> ResponseResult<Redirect> {
    let config = google_config(&state)?;
    let oauth_state = Uuid::new_v4().to_string();

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, oauth_state.clone()))
        .path("/api/calendar/google")
        .http_only(true)
        .secure(true);
    cookies.private(&state.cookie_key).add(cookie.into());

    let url = config.consent_url(&state.app.app_url(CALLBACK_PATH), &oauth_state);

    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Connected {
    google_email: Option<String>,
    scope: String,
}

#[axum_macros::debug_handler(state = AppState)]
pub(crate) async fn callback(
    State(state): State<AppState>,
    current: CurrentUser,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> ResponseResult<Json<Connected>> {
    let config = google_config(&state)?;

    let private = cookies.private(&state.cookie_key);
    let expected = private.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    private.remove(
        Cookie::build(OAUTH_STATE_COOKIE)
            .path("/api/calendar/google")
            .into(),
    );

    if let Some(error) = query.error {
        tracing::warn!(%error, "Google consent was not granted");
        return Err(ServerError::bad_request(format!(
            "Google authorization failed: {error}"
        )));
    }

    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => {
            tracing::warn!("Google OAuth state did not match");
            return Err(ServerError::bad_request("OAuth state mismatch"));
        }
    }

    let code = query
        .code
        .ok_or_else(|| ServerError::bad_request("Missing authorization code"))?;

    let tokens = google::exchange_code(
        &state.http,
        config,
        &code,
        &state.app.app_url(CALLBACK_PATH),
    )
    .await
    .with_status(StatusCode::BAD_GATEWAY)?;

    let google_email = match google::user_email(&state.http, config, &tokens.access_token).await {
        Ok(email) => email,
        Err(error) => {
            tracing::warn!(?error, "Could not look up Google account email");
            None
        }
    };

    let encrypted_access_token = state.encrypt_config.encrypt(&tokens.access_token)?;
    let encrypted_refresh_token = tokens
        .refresh_token
        .as_deref()
        .map(|token| state.encrypt_config.encrypt(token))
        .transpose()?;

    let link = GoogleLink::upsert(
        &state.db,
        current.user_id(),
        NewGoogleLink {
            google_email: google_email.as_deref(),
            encrypted_access_token: &encrypted_access_token,
            encrypted_refresh_token: encrypted_refresh_token.as_deref(),
            access_token_expires_at: tokens.expires_at(Utc::now()),
            scope: &tokens.scope,
        },
    )
    .await
    .context("Failed to store Google tokens")?;

    tracing::info!(user_id = %current.user_id(), "Connected Google Calendar");

    Ok(Json(Connected {
        google_email: link.google_email,
        scope: link.scope,
    }))
}

pub(crate) async fn disconnect(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<StatusCode> {
    if !GoogleLink::delete(&state.db, current.user_id()).await? {
        return Err(ServerError::not_found("Google link"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// A usable access token for `link`, refreshed first when it is about to expire.
async fn access_token(
    state: &AppState,
    config: &GoogleConfig,
    link: &GoogleLink,
) -> ResponseResult<String> {
    let now = Utc::now();
    if !google::needs_refresh(link.access_token_expires_at, now) {
        return Ok(state.encrypt_config.decrypt(&link.encrypted_access_token)?);
    }

    let Some(encrypted_refresh) = link.encrypted_refresh_token.as_deref() else {
        return Err(ServerError::bad_request(
            "Google access expired, reconnect your calendar",
        ));
    };
    let refresh_token = state.encrypt_config.decrypt(encrypted_refresh)?;

    let tokens = google::refresh(&state.http, config, &refresh_token)
        .await
        .with_status(StatusCode::BAD_GATEWAY)?;

    let encrypted = state.encrypt_config.encrypt(&tokens.access_token)?;
    link.update_access_token(&state.db, &encrypted, tokens.expires_at(now))
        .await
        .context("Failed to store refreshed Google token")?;
    tracing::debug!(user_id = %link.user_id, "Refreshed Google access token");

    Ok(tokens.access_token)
}

#[derive(Debug, Serialize)]
pub(crate) struct EventFailure {
    summary: String,
    error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedEvents {
    created: Vec<InsertedEvent>,
    failed: usize,
    errors: Vec<EventFailure>,
}

pub(crate) async fn create_events(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(week): Path<String>,
) -> ResponseResult<impl IntoResponse> {
    let config = google_config(&state)?;
    let week_start = parse_week(&week)?;

    let link = GoogleLink::get(&state.db, current.user_id())
        .await?
        .ok_or_else(|| ServerError::bad_request("Google Calendar is not connected"))?;
    let settings = db::settings::get(&state.db, current.user_id()).await?;

    let (_, assignments) =
        super::plans::week_assignments(&state, current.household_id(), week_start).await?;
    let meals: Vec<PlannedMeal> = assignments
        .into_iter()
        .map(|planned| PlannedMeal {
            day: planned.assignment.day_of_week,
            cook: planned.assignment.cook,
            recipe: EventRecipe {
                title: planned.title,
                prep_time: planned.prep_time,
                cook_time: planned.cook_time,
                servings: planned.assignment.serving_size.or(planned.servings),
                ingredients: planned.ingredients,
                instructions: planned.instructions,
                source_url: planned.source_url,
            },
        })
        .collect();

    let events =
        build_events(week_start, &meals, &settings.calendar).with_status(StatusCode::BAD_REQUEST)?;
    if events.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(CreatedEvents {
                created: Vec::new(),
                failed: 0,
                errors: Vec::new(),
            }),
        ));
    }

    let token = access_token(&state, config, &link).await?;

    let mut created = Vec::new();
    let mut errors = Vec::new();
    for event in &events {
        match google::insert_event(&state.http, config, &token, event).await {
            Ok(inserted) => created.push(inserted),
            Err(error) => {
                tracing::warn!(?error, summary = %event.summary, "Failed to create calendar event");
                errors.push(EventFailure {
                    summary: event.summary.clone(),
                    error: error.to_string(),
                });
            }
        }
    }

    if created.is_empty() {
        return Err(ServerError::new(
            StatusCode::BAD_GATEWAY,
            format!("Failed to create any of {} calendar events", events.len()),
        ));
    }

    tracing::info!(
        created = created.len(),
        failed = errors.len(),
        %week_start,
        "Created calendar events"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedEvents {
            created,
            failed: errors.len(),
            errors,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, Request};

    use super::*;
    use crate::http_server::test_helpers::{send, test_app, test_state};

    #[tokio::test]
    async fn unconfigured_google_is_unavailable() {
        let state = test_state();

        let err = google_config(&state).unwrap_err();

        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn connecting_needs_a_session() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/calendar/google/connect")
            .body(axum::body::Body::empty())
            .unwrap();

        let (status, _) = send(&test_app(), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
