use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

/// Remote call of the design-service chain that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignStage {
    /// `GET /v1/files/{key}`
    Document,
    /// `GET /v1/images/{key}`
    Export,
    /// Fetching the exported image bytes from the signed URL.
    Download,
}

impl DesignStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignStage::Document => "document fetch",
            DesignStage::Export => "frame export",
            DesignStage::Download => "image download",
        }
    }
}

impl fmt::Display for DesignStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Design API error during {stage} (status: {status:?}): {message}")]
    DesignApi {
        stage: DesignStage,
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Design API request failed during {stage}: {source}")]
    DesignTransport {
        stage: DesignStage,
        #[source]
        source: reqwest::Error,
    },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Render timed out after {0:?}; rendering session was terminated")]
    RenderTimeout(Duration),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Design API returned an unreadable payload during {stage}: {source}")]
    DesignDecode {
        stage: DesignStage,
        #[source]
        source: serde_json::Error,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn design_api(
        stage: DesignStage,
        status: Option<StatusCode>,
        message: impl Into<String>,
    ) -> Self {
        GatewayError::DesignApi {
            stage,
            status,
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        GatewayError::Render(message.into())
    }

    /// Design-service stage that failed, if this error came from that chain.
    pub fn design_stage(&self) -> Option<DesignStage> {
        match self {
            GatewayError::DesignApi { stage, .. }
            | GatewayError::DesignTransport { stage, .. }
            | GatewayError::DesignDecode { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            GatewayError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check the images directory exists and is writable.",
            ),
            GatewayError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            GatewayError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com).",
            ),
            GatewayError::DesignApi { status, .. } => {
                let remediation = match status.map(|s| s.as_u16()) {
                    Some(403) => "Check the Figma token has access to this file.",
                    Some(404) => "Verify the Figma file key.",
                    Some(429) => "Rate limited by Figma; retry after waiting.",
                    _ => "Check the Figma token and file key; retry after waiting.",
                };
                ErrorPayload::new(ErrorCategory::Design, self.to_string(), remediation)
            }
            GatewayError::DesignTransport { .. } => ErrorPayload::new(
                ErrorCategory::Network,
                self.to_string(),
                "Check connectivity to the Figma API and retry.",
            ),
            GatewayError::Render(msg) => {
                let lower = msg.to_ascii_lowercase();
                let remediation = if lower.contains("playwright npm package is missing") {
                    "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`)."
                } else if lower.contains("not found on path") {
                    "Install Node.js and ensure the node binary is on PATH."
                } else if lower.contains("timeout") {
                    "Increase the navigation/network-idle timeouts or ensure the page finishes loading."
                } else {
                    "Re-run with --verbose to see the renderer output."
                };
                ErrorPayload::new(ErrorCategory::Render, self.to_string(), remediation)
            }
            GatewayError::RenderTimeout(_) => ErrorPayload::new(
                ErrorCategory::Render,
                self.to_string(),
                "Increase --process-timeout or ensure the page reaches network idle.",
            ),
            GatewayError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify both captures are valid PNG images.",
            ),
            GatewayError::DesignDecode { .. } => ErrorPayload::new(
                ErrorCategory::Design,
                self.to_string(),
                "The design service returned an unexpected payload; run with --verbose for details.",
            ),
            GatewayError::Task(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Re-run with --verbose; the comparison worker stopped unexpectedly.",
            ),
            GatewayError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                let remediation = if lower.contains("figma_token") || lower.contains("figma token")
                {
                    "Pass --token or set FIGMA_TOKEN."
                } else if lower.contains("threshold") {
                    "Use a threshold between 0 and 1 (default 0.1)."
                } else {
                    "Check flags/config values (e.g., --viewport WIDTHxHEIGHT, timeouts)."
                };
                ErrorPayload::new(ErrorCategory::Config, msg.to_string(), remediation)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Pipeline,
    Comparison,
    Config,
    Network,
    Design,
    Render,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
            missing_fields: Vec::new(),
        }
    }

    pub fn bare(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            remediation: None,
            missing_fields: Vec::new(),
        }
    }
}
