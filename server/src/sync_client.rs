use async_trait::async_trait;
use color_eyre::{
    eyre::{eyre, Context as _},
    Result,
};
use kitchen::sync::{Backend, SyncDocument};
use reqwest::StatusCode;
use url::Url;

/// The server's `/api/sync/{key}` endpoint as a sync backend.
#[derive(Debug, Clone)]
pub(crate) struct RemoteBackend {
    client: reqwest::Client,
    url: Url,
    token: String,
}

impl RemoteBackend {
    pub(crate) fn new(client: reqwest::Client, server: &Url, token: &str, key: &str) -> Result<Self> {
        let url = server
            .join(&format!("/api/sync/{key}"))
            .wrap_err("Invalid sync key")?;

        Ok(Self {
            client,
            url,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn load(&self) -> Result<Option<SyncDocument>> {
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .wrap_err("Failed to reach sync server")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(eyre!("Sync server answered {}", response.status()));
        }

        let doc = response
            .json::<SyncDocument>()
            .await
            .wrap_err("Sync server sent an unreadable document")?;

        Ok(Some(doc))
    }

    #[tracing::instrument(skip(self, doc), fields(url = %self.url))]
    async fn save(&self, doc: &SyncDocument) -> Result<SyncDocument> {
        let response = self
            .client
            .put(self.url.clone())
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "payload": doc.payload }))
            .send()
            .await
            .wrap_err("Failed to reach sync server")?;

        if !response.status().is_success() {
            return Err(eyre!("Sync server answered {}", response.status()));
        }

        response
            .json::<SyncDocument>()
            .await
            .wrap_err("Sync server sent an unreadable document")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn backend(server: &MockServer) -> RemoteBackend {
        let base = Url::parse(&server.uri()).unwrap();
        RemoteBackend::new(reqwest::Client::new(), &base, "token-123", "plans").unwrap()
    }

    #[tokio::test]
    async fn missing_documents_load_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sync/plans"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(backend(&server).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_and_saves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sync/plans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {"weeks": 3},
                "updated_at": "2025-12-08T12:00:00Z"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/sync/plans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {"weeks": 3},
                "updated_at": "2025-12-08T12:05:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let remote = backend(&server);
        let doc = remote.load().await.unwrap().unwrap();
        assert_eq!(doc.payload, json!({"weeks": 3}));

        let stored = remote.save(&doc).await.unwrap();
        assert_eq!(stored.payload, json!({"weeks": 3}));
        assert_eq!(stored.updated_at.to_rfc3339(), "2025-12-08T12:05:00+00:00");
    }

    #[tokio::test]
    async fn server_errors_fail_the_save() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let doc = SyncDocument {
            payload: json!({}),
            updated_at: chrono::Utc::now(),
        };
        assert!(backend(&server).save(&doc).await.is_err());
    }
}
