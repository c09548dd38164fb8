use color_eyre::{
    eyre::{eyre, Context as _},
    Result,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone)]
pub struct OpenFoodFactsConfig {
    pub base_url: Url,
}

impl OpenFoodFactsConfig {
    #[tracing::instrument(name = "OpenFoodFactsConfig::from_env")]
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("OPEN_FOOD_FACTS_URL")
            .unwrap_or_else(|_| "https://world.openfoodfacts.org".to_string());

        Ok(Self {
            base_url: Url::parse(&base_url).wrap_err("Invalid OPEN_FOOD_FACTS_URL")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub barcode: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<String>,
    pub image_url: Option<String>,
    pub categories: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    product_name: Option<String>,
    brands: Option<String>,
    quantity: Option<String>,
    image_url: Option<String>,
    categories: Option<String>,
}

pub fn is_valid_barcode(barcode: &str) -> bool {
    (6..=14).contains(&barcode.len()) && barcode.chars().all(|c| c.is_ascii_digit())
}

/// `None` when Open Food Facts doesn't know the barcode.
#[tracing::instrument(skip(client, config))]
pub async fn lookup(
    client: &reqwest::Client,
    config: &OpenFoodFactsConfig,
    barcode: &str,
) -> Result<Option<Product>> {
    let url = config
        .base_url
        .join(&format!("/api/v2/product/{barcode}.json"))?;
    let response = client.get(url).send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(eyre!("Open Food Facts error {}", response.status()));
    }

    let body: ProductResponse = response.json().await?;
    if body.status == 0 {
        return Ok(None);
    }

    Ok(body.product.map(|p| Product {
        barcode: barcode.to_string(),
        name: p.product_name.filter(|n| !n.trim().is_empty()),
        brand: p.brands,
        quantity: p.quantity,
        image_url: p.image_url,
        categories: p.categories,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn config(server: &MockServer) -> OpenFoodFactsConfig {
        OpenFoodFactsConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
        }
    }

    #[test]
    fn barcodes() {
        assert!(is_valid_barcode("737628064502"));
        assert!(!is_valid_barcode("12ab"));
        assert!(!is_valid_barcode(""));
    }

    #[tokio::test]
    async fn found_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/737628064502.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "product": {"product_name": "Rice Noodles", "brands": "Thai Kitchen"}
            })))
            .mount(&server)
            .await;

        let product = lookup(&reqwest::Client::new(), &config(&server), "737628064502")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(product.name.as_deref(), Some("Rice Noodles"));
        assert_eq!(product.brand.as_deref(), Some("Thai Kitchen"));
    }

    #[tokio::test]
    async fn unknown_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/111111.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 0})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/222222.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        assert!(lookup(&client, &config(&server), "111111").await.unwrap().is_none());
        assert!(lookup(&client, &config(&server), "222222").await.unwrap().is_none());
    }
}
