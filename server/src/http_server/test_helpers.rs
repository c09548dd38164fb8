use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt as _;
use url::Url;

use crate::{
    emailjs::EmailJsConfig,
    encrypt,
    http_server::cookies::CookieKey,
    open_food_facts::OpenFoodFactsConfig,
    state::{AppConfig, VersionInfo},
    AppState,
};

/// State whose pool never connects, for requests that fail before any query.
pub(crate) fn test_state() -> AppState {
    AppState {
        app: AppConfig {
            base_url: Url::parse("http://localhost:3000").unwrap(),
            scan_image_dir: std::env::temp_dir().join("meal-planner-test-scans"),
        },
        versions: VersionInfo::from_env(),
        db: PgPoolOptions::new()
            .connect_lazy("postgres://localhost/meal_planner_test")
            .unwrap(),
        cookie_key: CookieKey(tower_cookies::Key::generate()),
        encrypt_config: encrypt::Config::for_tests(),
        http: reqwest::Client::new(),
        anthropic: None,
        food_facts: OpenFoodFactsConfig {
            base_url: Url::parse("http://localhost:9").unwrap(),
        },
        emailjs: EmailJsConfig {
            base_url: Url::parse("http://localhost:9").unwrap(),
        },
        google: None,
    }
}

pub(crate) fn test_app() -> Router {
    crate::http_server::app(test_state())
}

pub(crate) fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Sends a request, returning the status and the body as JSON (`Null` when it isn't).
pub(crate) async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
