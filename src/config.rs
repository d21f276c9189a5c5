//! Gateway configuration.
//!
//! Built once at startup (defaults, then an optional `.toml`/`.yaml` file,
//! then environment overrides) and passed into the server and pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::{PageRenderer, RenderOptions};
use crate::design::{DesignClient, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{GatewayError, Result};
use crate::pipeline::PipelineOptions;
use crate::storage::ScreenshotStore;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_CONTEXT_PATH: &str = "/gateway";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub browser: RenderOptions,
    pub design: DesignConfig,
    pub comparison: PipelineOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for the gateway routes.
    pub context_path: String,
    /// Public base URL that stored images are served under.
    pub image_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
            image_base_url: None,
        }
    }
}

impl ServerConfig {
    /// Context path with a leading slash and no trailing slash; `""` for root.
    pub fn normalized_context_path(&self) -> String {
        let trimmed = self.context_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub images_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    pub api_base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub export_scale: f32,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            export_scale: 1.0,
        }
    }
}

impl Config {
    /// Defaults, overlaid by `path` (if given) and by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| {
                GatewayError::Config(format!("Invalid config {}: {e}", path.display()))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                GatewayError::Config(format!("Invalid config {}: {e}", path.display()))
            })
        }
    }

    /// Apply `PORT`, `GATEWAY_CONTEXT_PATH` and `IMAGE_BASE_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = read("PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                GatewayError::Config(format!("PORT must be a port number, got '{port}'"))
            })?;
        }
        if let Some(context_path) = read("GATEWAY_CONTEXT_PATH") {
            self.server.context_path = context_path;
        }
        if let Some(base) = read("IMAGE_BASE_URL") {
            self.server.image_base_url = Some(base);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.comparison.compare.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(GatewayError::Config(format!(
                "comparison.threshold must be between 0 and 1, got {threshold}"
            )));
        }

        let browser = &self.browser;
        for (name, value) in [
            ("browser.navigation_timeout", browser.navigation_timeout),
            ("browser.network_idle_timeout", browser.network_idle_timeout),
            ("browser.process_timeout", browser.process_timeout),
            ("design.request_timeout", self.design.request_timeout),
        ] {
            if value.is_zero() {
                return Err(GatewayError::Config(format!("{name} must be greater than zero")));
            }
        }

        if browser.viewport.width == 0 || browser.viewport.height == 0 {
            return Err(GatewayError::Config(format!(
                "browser.viewport must be positive, got {}",
                browser.viewport
            )));
        }
        if browser.node_command.trim().is_empty() {
            return Err(GatewayError::Config(
                "browser.node_command must not be empty".to_string(),
            ));
        }

        let scale = self.design.export_scale;
        if !(scale > 0.0 && scale <= 4.0) {
            return Err(GatewayError::Config(format!(
                "design.export_scale must be in (0, 4], got {scale}"
            )));
        }

        url::Url::parse(&self.design.api_base_url).map_err(|e| {
            GatewayError::Config(format!(
                "design.api_base_url '{}' is not a valid URL: {e}",
                self.design.api_base_url
            ))
        })?;
        Ok(())
    }

    pub fn screenshot_store(&self) -> ScreenshotStore {
        ScreenshotStore::new(
            &self.storage.images_dir,
            self.server.image_base_url.clone(),
        )
    }

    pub fn page_renderer(&self, store: ScreenshotStore) -> PageRenderer {
        PageRenderer::new(self.browser.clone(), store)
    }

    pub fn design_client(&self) -> Result<DesignClient> {
        Ok(
            DesignClient::with_base_url(&self.design.api_base_url, self.design.request_timeout)?
                .with_export_scale(self.design.export_scale),
        )
    }
}
