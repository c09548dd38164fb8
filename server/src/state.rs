use std::path::PathBuf;

use color_eyre::eyre::Context as _;
use db::setup_db_pool;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;
use url::Url;

use crate::{
    anthropic::AnthropicConfig, emailjs::EmailJsConfig, encrypt, google::GoogleConfig,
    http_server::cookies::CookieKey, open_food_facts::OpenFoodFactsConfig, Result,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub base_url: Url,
    pub scan_image_dir: PathBuf,
}

impl AppConfig {
    #[instrument(name = "AppConfig::from_env")]
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("APP_BASE_URL")
            .wrap_err("Missing APP_BASE_URL, needed for app launch")?;
        let base_url = Url::parse(&base_url).wrap_err("Invalid APP_BASE_URL not parsable")?;

        let scan_image_dir = std::env::var("SCAN_IMAGE_DIR")
            .map_or_else(|_| PathBuf::from("./data/scans"), PathBuf::from);

        Ok(Self {
            base_url,
            scan_image_dir,
        })
    }

    pub fn app_url(&self, path: &str) -> String {
        let mut url = self.base_url.clone();

        url.set_path(path);

        url.into()
    }
}

#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version: &'static str,
}

impl VersionInfo {
    pub fn from_env() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub app: AppConfig,
    pub versions: VersionInfo,
    pub db: PgPool,
    pub cookie_key: CookieKey,
    pub encrypt_config: encrypt::Config,
    pub http: reqwest::Client,
    /// Photo scanning is switched off without an API key.
    pub anthropic: Option<AnthropicConfig>,
    pub food_facts: OpenFoodFactsConfig,
    pub emailjs: EmailJsConfig,
    pub google: Option<GoogleConfig>,
}

impl AppState {
    #[instrument(name = "AppState::from_env", err)]
    pub async fn from_env() -> Result<Self> {
        let cookie_key = CookieKey::from_env_or_generate()?;

        let app_state = AppState {
            app: AppConfig::from_env()?,
            versions: VersionInfo::from_env(),
            db: setup_db_pool().await?,
            cookie_key,
            encrypt_config: encrypt::Config::from_env()?,
            http: reqwest::Client::builder()
                .user_agent(concat!("meal-planner/", env!("CARGO_PKG_VERSION")))
                .build()?,
            anthropic: AnthropicConfig::from_env()?,
            food_facts: OpenFoodFactsConfig::from_env()?,
            emailjs: EmailJsConfig::from_env()?,
            google: GoogleConfig::from_env()?,
        };

        Ok(app_state)
    }
}
