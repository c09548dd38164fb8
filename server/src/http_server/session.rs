use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use color_eyre::eyre::eyre;
use db::{sessions::Session, users::User};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{http_server::ServerError, AppState};

pub(crate) const SESSION_COOKIE: &str = "session_id";

/// The signed in user, from the private session cookie or a bearer token.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    pub fn user_id(&self) -> Uuid {
        self.user.user_id
    }

    pub fn household_id(&self) -> Uuid {
        self.user.household_id
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw_session_id = if let Some(token) = bearer_token(parts) {
            Some(token.to_string())
        } else {
            let cookies = Cookies::from_request_parts(parts, state)
                .await
                .map_err(|(_, msg)| {
                    ServerError(
                        eyre!("Failed to get cookies: {msg}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                })?;

            cookies
                .private(&state.cookie_key)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
        };

        let Some(session_id) = raw_session_id.and_then(|s| Uuid::parse_str(&s).ok()) else {
            return Err(ServerError::unauthorized());
        };

        let session = Session::get_active(&state.db, session_id)
            .await?
            .ok_or_else(ServerError::unauthorized)?;
        let user = User::get_by_id(&state.db, session.user_id)
            .await?
            .ok_or_else(ServerError::unauthorized)?;

        let span = tracing::Span::current();
        span.record("enduser.id", user.user_id.to_string());
        span.record("household.id", user.household_id.to_string());

        Ok(Self { user, session })
    }
}

pub(crate) fn set_session_cookie(cookies: &Cookies, state: &AppState, session: &Session) {
    let cookie = Cookie::build((SESSION_COOKIE, session.session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(true);

    cookies.private(&state.cookie_key).add(cookie.into());
}

pub(crate) fn remove_session_cookie(cookies: &Cookies, state: &AppState) {
    cookies
        .private(&state.cookie_key)
        .remove(Cookie::build(SESSION_COOKIE).path("/").into());
}
