use std::fmt::{Debug, Display};

use axum::{http::StatusCode, response::IntoResponse, Json};
use color_eyre::eyre;
use serde_json::json;

/// An error plus the status it should answer with.
pub struct ServerError(pub(crate) eyre::Report, pub(crate) StatusCode);

impl ServerError {
    pub(crate) fn new(status: StatusCode, message: impl Display) -> Self {
        Self(eyre::eyre!("{message}"), status)
    }

    pub(crate) fn bad_request(message: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not signed in")
    }

    pub(crate) fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Not allowed")
    }

    pub(crate) fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.1
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Status Code: {}", self.1)?;
        write!(f, "ServerError: {:?}", self.0)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        if self.1.is_server_error() {
            let error: &(dyn std::error::Error + Send + Sync + 'static) = self.0.as_ref();
            sentry::capture_error(error);

            tracing::error!(error = ?self, "ServerError");
        } else {
            tracing::debug!(status = %self.1, error = %self.0, "Request rejected");
        }

        (self.1, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<eyre::Report> for ServerError {
    fn from(err: eyre::Report) -> Self {
        ServerError(err, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError>;
}

impl<T, E> WithStatus<T> for Result<T, E>
where
    E: Into<eyre::Report>,
{
    fn with_status(self, status: StatusCode) -> Result<T, ServerError> {
        self.map_err(|e| ServerError(e.into(), status))
    }
}

/// Turns a missing row into a 404.
pub(crate) trait OrNotFound<T> {
    fn or_not_found(self, what: &str) -> Result<T, ServerError>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, what: &str) -> Result<T, ServerError> {
        self.ok_or_else(|| ServerError::not_found(what))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;

    #[tokio::test]
    async fn errors_render_as_json() {
        let response = ServerError::bad_request("Title is required").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Title is required");
    }

    #[test]
    fn with_status_keeps_the_message() {
        let result: Result<(), _> = Err(eyre!("upstream exploded"));
        let err = result.with_status(StatusCode::BAD_GATEWAY).unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "upstream exploded");
    }
}
