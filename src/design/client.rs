//! HTTP client for the design service: document fetch, frame export, and
//! byte download.

use crate::error::{DesignStage, GatewayError, Result};
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::tree::DesignFile;

pub const DEFAULT_API_BASE_URL: &str = "https://api.figma.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request credential for the design service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesignAuth {
    PersonalAccessToken(String),
}

impl DesignAuth {
    pub fn token(&self) -> &str {
        match self {
            DesignAuth::PersonalAccessToken(token) => token,
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            DesignAuth::PersonalAccessToken(token) => builder.header("X-FIGMA-TOKEN", token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageExportResponse {
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    images: HashMap<String, Option<String>>,
}

/// Client for the design service REST API.
///
/// Credentials are supplied per call; the client holds no token of its own.
#[derive(Debug, Clone)]
pub struct DesignClient {
    http: Client,
    base_url: Url,
    export_scale: f32,
}

impl DesignClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Network)?;

        Ok(Self {
            http,
            base_url,
            export_scale: 1.0,
        })
    }

    pub fn with_export_scale(mut self, scale: f32) -> Self {
        self.export_scale = scale;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch_document(&self, file_key: &str, auth: &DesignAuth) -> Result<DesignFile> {
        let url = self.endpoint(&format!("/v1/files/{file_key}"))?;
        debug!(%file_key, "fetching design document");
        let request = auth.apply(self.http.get(url));
        self.send_json(DesignStage::Document, request).await
    }

    /// Request a PNG export of one node and return its signed image URL.
    pub async fn export_node(
        &self,
        file_key: &str,
        node_id: &str,
        auth: &DesignAuth,
    ) -> Result<String> {
        let mut url = self.endpoint(&format!("/v1/images/{file_key}"))?;
        url.query_pairs_mut()
            .append_pair("ids", node_id)
            .append_pair("format", "png")
            .append_pair("scale", &self.export_scale.to_string());
        debug!(%file_key, %node_id, "requesting frame export");

        let request = auth.apply(self.http.get(url));
        let export: ImageExportResponse = self.send_json(DesignStage::Export, request).await?;
        if let Some(err) = export.err.filter(|e| !e.is_empty()) {
            return Err(GatewayError::design_api(DesignStage::Export, None, err));
        }

        export
            .images
            .get(node_id)
            .cloned()
            .flatten()
            .ok_or_else(|| {
                GatewayError::design_api(
                    DesignStage::Export,
                    None,
                    format!("image URL missing for node {node_id}"),
                )
            })
    }

    pub async fn fetch_bytes(&self, image_url: &str, auth: &DesignAuth) -> Result<Vec<u8>> {
        let url = Url::parse(image_url)?;
        let stage = DesignStage::Download;
        let response = auth
            .apply(self.http.get(url))
            .send()
            .await
            .map_err(|source| GatewayError::DesignTransport { stage, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::design_api(
                stage,
                Some(status),
                format!("failed to download image (status {}): {}", status.as_u16(), body.trim()),
            ));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|source| GatewayError::DesignTransport { stage, source })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(GatewayError::InvalidUrl)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        stage: DesignStage,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|source| GatewayError::DesignTransport { stage, source })?;
        let status = response.status();
        let retry_after = retry_after(&response);
        let body = response
            .text()
            .await
            .map_err(|source| GatewayError::DesignTransport { stage, source })?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|source| GatewayError::DesignDecode { stage, source });
        }

        Err(GatewayError::design_api(
            stage,
            Some(status),
            error_message(status, &body, retry_after.as_deref()),
        ))
    }
}

fn retry_after(response: &Response) -> Option<String> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn error_message(status: StatusCode, body: &str, retry_after: Option<&str>) -> String {
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("err")
                .or_else(|| value.get("error"))
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

    match (status, retry_after, from_body) {
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), Some(msg)) => {
            format!("{msg} (rate limited, retry after {retry}s)")
        }
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), None) => {
            format!("rate limited by design API, retry after {retry}s")
        }
        (_, _, Some(msg)) => msg,
        _ => format!("design API returned status {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_body_err_field() {
        let msg = error_message(StatusCode::FORBIDDEN, r#"{"status":403,"err":"Invalid token"}"#, None);
        assert_eq!(msg, "Invalid token");
    }

    #[test]
    fn error_message_reports_rate_limit() {
        let msg = error_message(StatusCode::TOO_MANY_REQUESTS, "", Some("30"));
        assert!(msg.contains("retry after 30s"), "got: {msg}");

        let msg = error_message(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":"Too many"}"#,
            Some("5"),
        );
        assert_eq!(msg, "Too many (rate limited, retry after 5s)");
    }

    #[test]
    fn error_message_falls_back_to_status() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>", None);
        assert_eq!(msg, "design API returned status 502");
    }

    #[test]
    fn export_response_tolerates_null_urls() {
        let parsed: ImageExportResponse =
            serde_json::from_str(r#"{"err":null,"images":{"1:2":null}}"#).expect("parse");
        assert!(parsed.err.is_none());
        assert_eq!(parsed.images.get("1:2"), Some(&None));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = DesignClient::with_base_url("not a url", DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(GatewayError::InvalidUrl(_))));
    }

    #[test]
    fn auth_exposes_its_token() {
        assert_eq!(DesignAuth::PersonalAccessToken("a".into()).token(), "a");
    }

    #[tokio::test]
    async fn fetch_bytes_reports_download_stage_on_transport_failure() {
        let client = DesignClient::new().expect("client");
        let auth = DesignAuth::PersonalAccessToken("token".into());

        let result = client
            .fetch_bytes("http://127.0.0.1:1/nonexistent.png", &auth)
            .await;

        match result {
            Err(err @ GatewayError::DesignTransport { .. }) => {
                assert_eq!(err.design_stage(), Some(DesignStage::Download));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
