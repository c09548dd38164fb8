use base64::Engine as _;
use color_eyre::{
    eyre::{eyre, Context as _},
    Result,
};
use kitchen::pantry::{ScanType, MIN_CONFIDENCE};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
}

impl AnthropicConfig {
    /// `None` when `ANTHROPIC_API_KEY` isn't set.
    #[tracing::instrument(name = "AnthropicConfig::from_env")]
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") else {
            return Ok(None);
        };

        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());

        Ok(Some(Self {
            api_key,
            base_url: Url::parse(&base_url).wrap_err("Invalid ANTHROPIC_BASE_URL")?,
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content {
    Text { text: String },
    Image { source: ImageSource },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageSource {
    r#type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<Content>,
}

fn detection_prompt(scan_type: ScanType) -> String {
    format!(
        r#"Analyze this {scan_type} image and identify all visible food items and ingredients.

For each item you can clearly identify, provide:
1. ingredient: A normalized, generic name (e.g., "milk" not "Horizon Organic 2% Milk")
2. quantity: Estimated amount if visible (e.g., "1 carton", "half bottle", "3 apples")
3. category: One of: Produce, Meat & Seafood, Dairy & Eggs, Bakery, Pantry, Frozen, Spices, Condiments, Beverages, Other
4. confidence: A score from 0 to 1 indicating how confident you are in the identification

Only include items where you have at least {MIN_CONFIDENCE} confidence.
Ignore unclear items, empty containers, or non-food items.

Return the results as a JSON array, for example:
[{{"ingredient": "milk", "quantity": "1 gallon", "category": "Dairy & Eggs", "confidence": 0.95}}]

If nothing can be identified with sufficient confidence, return an empty array: []"#
    )
}

/// Asks the vision model what food is in the photo and returns its raw reply.
#[tracing::instrument(skip(client, config, image), fields(bytes = image.len()))]
pub async fn detect_food(
    client: &reqwest::Client,
    config: &AnthropicConfig,
    image: &[u8],
    media_type: &str,
    scan_type: ScanType,
) -> Result<String> {
    let request = MessagesRequest {
        model: &config.model,
        max_tokens: 1024,
        messages: vec![Message {
            role: "user",
            content: vec![
                Content::Image {
                    source: ImageSource {
                        r#type: "base64".to_string(),
                        media_type: media_type.to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(image),
                    },
                },
                Content::Text {
                    text: detection_prompt(scan_type),
                },
            ],
        }],
    };

    let url = config.base_url.join("/v1/messages")?;
    let response = client
        .post(url)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&request)
        .send()
        .await
        .wrap_err("Failed to reach the Anthropic API")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(eyre!("Anthropic API error {status}: {error_text}"));
    }

    let response: MessagesResponse = response.json().await?;

    response
        .content
        .into_iter()
        .find_map(|c| match c {
            Content::Text { text } => Some(text),
            _ => None,
        })
        .ok_or_else(|| eyre!("No text in Anthropic response"))
}
