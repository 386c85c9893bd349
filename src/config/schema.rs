use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on image-request rounds per turn, whatever the config says.
pub const MAX_IMAGE_ROUNDS_HARD_CAP: u32 = 10;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (`~/.formrestyler`) - computed, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub regen: RegenConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub screenshot: ScreenshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = UserDirs::new()
            .map(|u| u.home_dir().join(".formrestyler"))
            .unwrap_or_else(|| PathBuf::from(".formrestyler"));
        Self {
            config_path: data_dir.join("config.toml"),
            data_dir,
            gemini: GeminiConfig::default(),
            regen: RegenConfig::default(),
            gateway: GatewayConfig::default(),
            scrape: ScrapeConfig::default(),
            publish: PublishConfig::default(),
            media: MediaConfig::default(),
            screenshot: ScreenshotConfig::default(),
        }
    }
}

// ── Gemini ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. Usually supplied through `GEMINI_API_KEY` instead.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_backend_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    "gemini-3-flash-preview".into()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".into()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_max_output_tokens() -> u32 {
    65_536
}

fn default_backend_timeout_secs() -> u64 {
    180
}

fn default_base_url() -> String {
    crate::llm::gemini::DEFAULT_BASE_URL.into()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            image_model: default_image_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_backend_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

// ── Regeneration ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenConfig {
    /// Prior turns replayed to the model (default: 10)
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Image-request rounds allowed per turn (default: 4, capped at 10)
    #[serde(default = "default_max_image_rounds")]
    pub max_image_rounds: u32,
    /// Wall-clock limit for one whole turn, image rounds included
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
}

fn default_history_window() -> usize {
    10
}

fn default_max_image_rounds() -> u32 {
    4
}

fn default_turn_timeout_secs() -> u64 {
    300
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_image_rounds: default_max_image_rounds(),
            turn_timeout_secs: default_turn_timeout_secs(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Externally reachable origin used in submit, media and publish URLs.
    /// Defaults to `http://<host>:<port>`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_gateway_timeout_secs() -> u64 {
    360
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            public_base_url: None,
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn public_base_url(&self) -> String {
        match self.public_base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }
}

// ── Scraping ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scrape_timeout_secs() -> u64 {
    20
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
        }
    }
}

// ── Publishing ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Retention for published forms (default: 30 days)
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

fn default_ttl_hours() -> u64 {
    720
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

// ── Media ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Where generated and uploaded images are written.
    /// Defaults to `<data_dir>/media`.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_max_upload_mb() -> usize {
    10
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

// ── Screenshots ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Headless Chromium executable (default: `chromium`)
    #[serde(default = "default_chrome_binary")]
    pub chrome_binary: String,
    #[serde(default = "default_viewport_width")]
    pub width: u32,
    #[serde(default = "default_viewport_height")]
    pub height: u32,
    #[serde(default = "default_screenshot_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_chrome_binary() -> String {
    "chromium".into()
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_screenshot_timeout_secs() -> u64 {
    15
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            chrome_binary: default_chrome_binary(),
            width: default_viewport_width(),
            height: default_viewport_height(),
            timeout_secs: default_screenshot_timeout_secs(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(".formrestyler"))
    }

    /// Load `<data_dir>/config.toml`, writing defaults when it does not exist.
    pub fn load_or_init_in(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("config.toml");

        if !data_dir.exists() {
            fs::create_dir_all(data_dir).context("Failed to create .formrestyler directory")?;
        }

        let config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.data_dir = data_dir.to_path_buf();
            config
        } else {
            let config = Self {
                config_path,
                data_dir: data_dir.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // API key: GEMINI_API_KEY or GOOGLE_API_KEY
        if let Ok(key) =
            std::env::var("GEMINI_API_KEY").or_else(|_| std::env::var("GOOGLE_API_KEY"))
            && !key.trim().is_empty()
        {
            self.gemini.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("FORMRESTYLER_MODEL")
            && !model.is_empty()
        {
            self.gemini.model = model;
        }

        if let Ok(port_str) = std::env::var("FORMRESTYLER_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("FORMRESTYLER_HOST")
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(url) = std::env::var("FORMRESTYLER_PUBLIC_URL")
            && !url.is_empty()
        {
            self.gateway.public_base_url = Some(url);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.regen.history_window == 0 {
            return Err(ConfigError::Validation(
                "regen.history_window must be at least 1".into(),
            ));
        }
        if self.regen.max_image_rounds == 0
            || self.regen.max_image_rounds > MAX_IMAGE_ROUNDS_HARD_CAP
        {
            return Err(ConfigError::Validation(format!(
                "regen.max_image_rounds must be between 1 and {MAX_IMAGE_ROUNDS_HARD_CAP}"
            )));
        }
        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            return Err(ConfigError::Validation(
                "gemini.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.media.max_upload_mb == 0 {
            return Err(ConfigError::Validation(
                "media.max_upload_mb must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media
            .storage_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("media"))
    }
}
