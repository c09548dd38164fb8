use axum::{extract::State, response::IntoResponse};
use maud::html;

use crate::{http_server::ServerError, AppState};

pub(crate) async fn versions(State(app_state): State<AppState>) -> impl IntoResponse {
    html! {
      p { "meal-planner" }
      p { "Version: " (app_state.versions.version) }
    }
}

pub(crate) async fn not_found() -> ServerError {
    ServerError::not_found("Route")
}
