use axum::{extract::State, Json};
use color_eyre::eyre::Context as _;
use db::{
    households::{Household, Member},
    users::User,
};
use serde::{Deserialize, Serialize};

use crate::{
    http_server::{errors::OrNotFound as _, session::CurrentUser, ResponseResult, ServerError},
    AppState,
};

#[derive(Debug, Serialize)]
pub(crate) struct HouseholdResponse {
    #[serde(flatten)]
    household: Household,
    members: Vec<Member>,
}

async fn household_response(state: &AppState, household: Household) -> ResponseResult<Json<HouseholdResponse>> {
    let members = household
        .members(&state.db)
        .await
        .context("Failed to load household members")?;

    Ok(Json(HouseholdResponse { household, members }))
}

pub(crate) async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ResponseResult<Json<HouseholdResponse>> {
    let household = Household::get_by_id(&state.db, current.household_id())
        .await?
        .or_not_found("Household")?;

    household_response(&state, household).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinRequest {
    invite_code: String,
}

/// Moves the user into the household behind an invite code. Their own recipes come along.
#[tracing::instrument(skip_all, fields(user_id = %current.user_id()))]
pub(crate) async fn join(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<JoinRequest>,
) -> ResponseResult<Json<HouseholdResponse>> {
    if request.invite_code.trim().is_empty() {
        return Err(ServerError::bad_request("Invite code is required"));
    }

    let household = Household::find_by_invite_code(&state.db, &request.invite_code)
        .await?
        .ok_or_else(|| ServerError::not_found("Household for that invite code"))?;

    let user: User = current.user.move_to_household(&state.db, household.household_id).await?;
    tracing::info!(household_id = %user.household_id, "Joined household");

    household_response(&state, household).await
}
