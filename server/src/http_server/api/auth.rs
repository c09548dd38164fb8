use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use color_eyre::eyre::{eyre, Context as _};
use db::{households::Household, sessions::Session, users::User};
use kitchen::settings::is_valid_email;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    http_server::{
        errors::WithStatus as _,
        session::{remove_session_cookie, set_session_cookie, CurrentUser},
        ResponseResult, ServerError,
    },
    AppState, Result,
};

const MIN_PASSWORD_LEN: usize = 8;

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| eyre!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Argon2 is deliberately slow, keep it off the async workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .wrap_err("Password hashing task panicked")
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignupRequest {
    email: String,
    password: String,
    display_name: Option<String>,
    household_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    user: User,
    household: Option<Household>,
    /// Usable as a bearer token by clients without cookies.
    token: String,
}

#[tracing::instrument(skip_all, fields(email = %request.email))]
pub(crate) async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(request): Json<SignupRequest>,
) -> ResponseResult<impl IntoResponse> {
    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ServerError::bad_request(format!("Invalid email address: {email}")));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServerError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ServerError::bad_request("An account with that email already exists"));
    }

    let display_name = request
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let household_name = request
        .household_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{}'s Kitchen", display_name.as_deref().unwrap_or(&email)));

    let password = request.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let household = Household::create(&state.db, &household_name)
        .await
        .context("Failed to create household")?;
    let user = User::create(
        &state.db,
        &email,
        display_name.as_deref(),
        &password_hash,
        household.household_id,
    )
    .await
    .context("Failed to create user")?;
    let session = Session::create(&state.db, user.user_id).await?;

    set_session_cookie(&cookies, &state, &session);
    tracing::info!(user_id = %user.user_id, "Signed up");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            household: Some(household),
            token: session.session_id.to_string(),
        }),
    ))
}

#[tracing::instrument(skip_all, fields(email = %request.email))]
pub(crate) async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(request): Json<LoginRequest>,
) -> ResponseResult<impl IntoResponse> {
    let invalid = || ServerError::new(StatusCode::UNAUTHORIZED, "Invalid email or password");

    let user = User::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(invalid)?;

    let password = request.password;
    let hash = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &hash)).await? {
        return Err(invalid());
    }

    let session = Session::create(&state.db, user.user_id).await?;
    set_session_cookie(&cookies, &state, &session);

    let household = Household::get_by_id(&state.db, user.household_id).await?;

    Ok(Json(AuthResponse {
        user,
        household,
        token: session.session_id.to_string(),
    }))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    current: CurrentUser,
) -> ResponseResult<StatusCode> {
    Session::delete(&state.db, current.session.session_id)
        .await
        .context("Failed to delete session")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;
    remove_session_cookie(&cookies, &state);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub(crate) struct MeResponse {
    user: User,
    household: Option<Household>,
}

pub(crate) async fn me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<MeResponse>> {
    let household = Household::get_by_id(&state.db, current.household_id()).await?;

    Ok(Json(MeResponse {
        user: current.user,
        household,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::http_server::test_helpers::{json_request, send, test_app};

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();

        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not a phc string"));
    }

    #[tokio::test]
    async fn signup_rejects_bad_input_before_touching_the_database() {
        let app = test_app();

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/signup",
                &json!({"email": "not-an-email", "password": "longenough"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid email"));

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/signup",
                &json!({"email": "sam@example.com", "password": "short"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn me_needs_a_session() {
        let app = test_app();

        let (status, body) = send(&app, json_request(Method::GET, "/api/me", &json!(null))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not signed in");
    }
}
