use chrono::{DateTime, Duration, Utc};
use color_eyre::{
    eyre::{eyre, Context as _},
    Result,
};
use kitchen::calendar::CalendarEvent;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CALENDAR_SCOPE: &str =
    "https://www.googleapis.com/auth/calendar.events https://www.googleapis.com/auth/userinfo.email";

/// Access tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub oauth_url: Url,
    pub token_url: Url,
    pub api_url: Url,
}

fn url_from_env(var: &str, default: &str) -> Result<Url> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).wrap_err_with(|| format!("Invalid {var}"))
}

impl GoogleConfig {
    /// `None` unless both the client id and secret are set.
    #[tracing::instrument(name = "GoogleConfig::from_env")]
    pub fn from_env() -> Result<Option<Self>> {
        let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            client_id,
            client_secret,
            oauth_url: url_from_env(
                "GOOGLE_OAUTH_URL",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?,
            token_url: url_from_env("GOOGLE_TOKEN_URL", "https://oauth2.googleapis.com/token")?,
            api_url: url_from_env("GOOGLE_API_URL", "https://www.googleapis.com")?,
        }))
    }

    pub fn consent_url(&self, redirect_uri: &str, state: &str) -> String {
        let mut url = self.oauth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", CALENDAR_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        url.into()
    }
}

// https://developers.google.com/identity/protocols/oauth2/web-server#httprest_3
#[derive(Debug, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

impl TokenData {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in)
    }
}

async fn token_request(
    client: &reqwest::Client,
    config: &GoogleConfig,
    form: &[(&str, &str)],
) -> Result<TokenData> {
    let response = client
        .post(config.token_url.clone())
        .form(form)
        .send()
        .await
        .wrap_err("Failed to reach the Google token endpoint")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(eyre!("Google token request failed {status}: {error_text}"));
    }

    response
        .json()
        .await
        .wrap_err("Failed to parse token response")
}

#[tracing::instrument(skip_all)]
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &GoogleConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenData> {
    token_request(
        client,
        config,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ],
    )
    .await
}

#[tracing::instrument(skip_all)]
pub async fn refresh(
    client: &reqwest::Client,
    config: &GoogleConfig,
    refresh_token: &str,
) -> Result<TokenData> {
    token_request(
        client,
        config,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn user_email(
    client: &reqwest::Client,
    config: &GoogleConfig,
    access_token: &str,
) -> Result<Option<String>> {
    let url = config.api_url.join("/oauth2/v2/userinfo")?;
    let info: UserInfo = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(info.email)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsertedEvent {
    pub id: String,
    #[serde(rename(deserialize = "htmlLink"))]
    pub html_link: Option<String>,
}

#[tracing::instrument(skip_all, fields(summary = %event.summary))]
pub async fn insert_event(
    client: &reqwest::Client,
    config: &GoogleConfig,
    access_token: &str,
    event: &CalendarEvent,
) -> Result<InsertedEvent> {
    let url = config
        .api_url
        .join("/calendar/v3/calendars/primary/events")?;
    let response = client
        .post(url)
        .bearer_auth(access_token)
        .json(event)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(eyre!("Calendar insert failed {status}: {error_text}"));
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use kitchen::calendar::EventTime;
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn config(server: &MockServer) -> GoogleConfig {
        let base = Url::parse(&server.uri()).unwrap();
        GoogleConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            oauth_url: base.join("/o/oauth2/v2/auth").unwrap(),
            token_url: base.join("/token").unwrap(),
            api_url: base,
        }
    }

    #[tokio::test]
    async fn consent_url_asks_for_offline_access() {
        let server = MockServer::start().await;
        let url = config(&server).consent_url("https://meals.test/callback", "abc");
        let url = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(pairs["state"], "abc");
        assert_eq!(pairs["scope"], CALENDAR_SCOPE);
    }

    #[tokio::test]
    async fn refreshes_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "expires_in": 3599,
                "scope": CALENDAR_SCOPE,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let token = refresh(&reqwest::Client::new(), &config(&server), "old-refresh")
            .await
            .unwrap();

        assert_eq!(token.access_token, "new-access");
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn refresh_margin() {
        let now = Utc::now();

        assert!(needs_refresh(now + Duration::seconds(30), now));
        assert!(needs_refresh(now - Duration::seconds(30), now));
        assert!(!needs_refresh(now + Duration::seconds(600), now));
    }

    #[tokio::test]
    async fn inserts_into_primary_calendar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt1",
                "htmlLink": "https://calendar.test/evt1"
            })))
            .mount(&server)
            .await;

        let time = EventTime {
            date_time: "2025-12-08T18:00:00".to_string(),
            time_zone: "UTC".to_string(),
        };
        let event = CalendarEvent {
            summary: "Chili".to_string(),
            description: String::new(),
            start: time.clone(),
            end: time,
            attendees: vec![],
        };

        let inserted = insert_event(&reqwest::Client::new(), &config(&server), "token", &event)
            .await
            .unwrap();

        assert_eq!(inserted.id, "evt1");
        assert_eq!(
            inserted.html_link.as_deref(),
            Some("https://calendar.test/evt1")
        );
        assert_eq!(
            serde_json::to_value(&inserted).unwrap(),
            json!({"id": "evt1", "html_link": "https://calendar.test/evt1"})
        );
    }
}
