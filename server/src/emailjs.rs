use color_eyre::{eyre::Context as _, Result};
use kitchen::settings::EmailSettings;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone)]
pub struct EmailJsConfig {
    pub base_url: Url,
}

impl EmailJsConfig {
    #[tracing::instrument(name = "EmailJsConfig::from_env")]
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("EMAILJS_BASE_URL")
            .unwrap_or_else(|_| "https://api.emailjs.com".to_string());

        Ok(Self {
            base_url: Url::parse(&base_url).wrap_err("Invalid EMAILJS_BASE_URL")?,
        })
    }
}

/// Everything the email template renders, minus the recipient.
#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListEmail {
    pub week_range: String,
    pub schedule_table: String,
    pub shopping_list_html: String,
    pub shopping_list_text: String,
    pub shopping_list_markdown: String,
    pub item_count: usize,
    pub recipe_count: usize,
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    to_email: &'a str,
    subject: String,
    #[serde(flatten)]
    email: &'a ShoppingListEmail,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendFailure {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SendSummary {
    pub successful: usize,
    pub total: usize,
    pub failed: usize,
    pub errors: Vec<SendFailure>,
}

async fn send_one(
    client: &reqwest::Client,
    url: Url,
    request: &SendRequest<'_>,
) -> Result<(), String> {
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    // EmailJS answers a plain "OK" on success
    if status == reqwest::StatusCode::OK && body.trim() == "OK" {
        Ok(())
    } else {
        Err(format!("EmailJS responded {status}: {body}"))
    }
}

/// One request per recipient. Failures are collected, not returned.
///
/// Callers check [`EmailSettings::is_configured`] first; missing keys go out empty.
#[tracing::instrument(skip_all, fields(recipients = recipients.len()))]
pub async fn send_shopping_list(
    client: &reqwest::Client,
    config: &EmailJsConfig,
    settings: &EmailSettings,
    recipients: &[String],
    email: &ShoppingListEmail,
) -> Result<SendSummary> {
    let url = config.base_url.join("/api/v1.0/email/send")?;
    let mut summary = SendSummary {
        total: recipients.len(),
        ..SendSummary::default()
    };

    for recipient in recipients {
        let request = SendRequest {
            service_id: settings.service_id.as_deref().unwrap_or_default(),
            template_id: settings.template_id.as_deref().unwrap_or_default(),
            user_id: settings.public_key.as_deref().unwrap_or_default(),
            template_params: TemplateParams {
                to_email: recipient,
                subject: format!("Meal Plan & Shopping List - Week of {}", email.week_range),
                email,
            },
        };

        match send_one(client, url.clone(), &request).await {
            Ok(()) => summary.successful += 1,
            Err(error) => {
                tracing::warn!(%recipient, %error, "Shopping list email failed");
                summary.failed += 1;
                summary.errors.push(SendFailure {
                    email: recipient.clone(),
                    error,
                });
            }
        }
    }

    Ok(summary)
}
