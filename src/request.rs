//! Comparison request as received from callers, and its validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::design::DesignAuth;

/// The four required inputs of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestField {
    PageUrl,
    DesignFileKey,
    DesignFrameName,
    DesignAccessToken,
}

impl RequestField {
    pub const ALL: [RequestField; 4] = [
        RequestField::PageUrl,
        RequestField::DesignFileKey,
        RequestField::DesignFrameName,
        RequestField::DesignAccessToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestField::PageUrl => "pageUrl",
            RequestField::DesignFileKey => "designFileKey",
            RequestField::DesignFrameName => "designFrameName",
            RequestField::DesignAccessToken => "designAccessToken",
        }
    }

    /// Field name in the HTTP request body.
    pub fn wire_name(&self) -> &'static str {
        match self {
            RequestField::PageUrl => "page_url",
            RequestField::DesignFileKey => "figma_file_key",
            RequestField::DesignFrameName => "figma_page_name",
            RequestField::DesignAccessToken => "figma_token",
        }
    }
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, possibly incomplete request. Accepts both the HTTP body names and
/// the camelCase names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    #[serde(default, rename = "page_url", alias = "pageUrl")]
    pub page_url: Option<String>,
    #[serde(default, rename = "figma_file_key", alias = "designFileKey")]
    pub design_file_key: Option<String>,
    #[serde(default, rename = "figma_page_name", alias = "designFrameName")]
    pub design_frame_name: Option<String>,
    #[serde(default, rename = "figma_token", alias = "designAccessToken")]
    pub design_access_token: Option<String>,
}

/// A request with every field present and the page URL parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub page_url: Url,
    pub file_key: String,
    pub frame_name: String,
    pub auth: DesignAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestProblem {
    Missing(Vec<RequestField>),
    Invalid { field: RequestField, reason: String },
}

impl ComparisonRequest {
    pub fn new(
        page_url: impl Into<String>,
        design_file_key: impl Into<String>,
        design_frame_name: impl Into<String>,
        design_access_token: impl Into<String>,
    ) -> Self {
        Self {
            page_url: Some(page_url.into()),
            design_file_key: Some(design_file_key.into()),
            design_frame_name: Some(design_frame_name.into()),
            design_access_token: Some(design_access_token.into()),
        }
    }

    fn field(&self, field: RequestField) -> Option<&str> {
        let value = match field {
            RequestField::PageUrl => &self.page_url,
            RequestField::DesignFileKey => &self.design_file_key,
            RequestField::DesignFrameName => &self.design_frame_name,
            RequestField::DesignAccessToken => &self.design_access_token,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Fields that are absent or blank, in declaration order.
    pub fn missing_fields(&self) -> Vec<RequestField> {
        RequestField::ALL
            .into_iter()
            .filter(|field| self.field(*field).is_none())
            .collect()
    }

    /// Check every field at once; all missing fields are reported together.
    /// The frame name is kept verbatim since lookup is exact. Only `http` and
    /// `https` page URLs are accepted.
    pub fn validate(&self) -> Result<ValidatedRequest, RequestProblem> {
        self.validate_with(false)
    }

    /// Like [`validate`](Self::validate), additionally accepting `file:` page
    /// URLs when `allow_file_urls` is set.
    pub fn validate_with(
        &self,
        allow_file_urls: bool,
    ) -> Result<ValidatedRequest, RequestProblem> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(RequestProblem::Missing(missing));
        }

        let raw_url = self.field(RequestField::PageUrl).unwrap_or_default().trim();
        let page_url = Url::parse(raw_url).map_err(|err| RequestProblem::Invalid {
            field: RequestField::PageUrl,
            reason: err.to_string(),
        })?;
        let allowed = match page_url.scheme() {
            "http" | "https" => true,
            "file" => allow_file_urls,
            _ => false,
        };
        if !allowed {
            return Err(RequestProblem::Invalid {
                field: RequestField::PageUrl,
                reason: format!("unsupported scheme '{}'", page_url.scheme()),
            });
        }

        Ok(ValidatedRequest {
            page_url,
            file_key: self
                .field(RequestField::DesignFileKey)
                .unwrap_or_default()
                .trim()
                .to_string(),
            frame_name: self
                .design_frame_name
                .clone()
                .unwrap_or_default(),
            auth: DesignAuth::PersonalAccessToken(
                self.field(RequestField::DesignAccessToken)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_request_validates() {
        let request = ComparisonRequest::new("https://example.com", "ABC123", "Homepage", "tok");
        let validated = request.validate().expect("valid");
        assert_eq!(validated.page_url.as_str(), "https://example.com/");
        assert_eq!(validated.file_key, "ABC123");
        assert_eq!(validated.frame_name, "Homepage");
        assert_eq!(validated.auth.token(), "tok");
    }

    #[test]
    fn all_missing_fields_are_reported_together() {
        let request = ComparisonRequest {
            page_url: Some("https://example.com".into()),
            design_file_key: None,
            design_frame_name: Some("   ".into()),
            design_access_token: None,
        };
        assert_eq!(
            request.validate(),
            Err(RequestProblem::Missing(vec![
                RequestField::DesignFileKey,
                RequestField::DesignFrameName,
                RequestField::DesignAccessToken,
            ]))
        );
    }

    #[test]
    fn empty_request_names_every_field() {
        assert_eq!(
            ComparisonRequest::default().missing_fields(),
            RequestField::ALL.to_vec()
        );
    }

    #[test]
    fn malformed_url_is_invalid_not_missing() {
        let request = ComparisonRequest::new("not a url", "ABC123", "Homepage", "tok");
        assert!(matches!(
            request.validate(),
            Err(RequestProblem::Invalid {
                field: RequestField::PageUrl,
                ..
            })
        ));

        let request = ComparisonRequest::new("ftp://example.com", "ABC123", "Homepage", "tok");
        assert!(request.validate().is_err());
    }

    #[test]
    fn local_files_are_rejected_unless_allowed() {
        let request = ComparisonRequest::new("file:///etc/passwd", "ABC123", "Homepage", "tok");
        match request.validate() {
            Err(RequestProblem::Invalid { field, reason }) => {
                assert_eq!(field, RequestField::PageUrl);
                assert!(reason.contains("file"), "got: {reason}");
            }
            other => panic!("expected invalid page url, got {other:?}"),
        }

        let validated = request.validate_with(true).expect("file urls enabled");
        assert_eq!(validated.page_url.scheme(), "file");
    }

    #[test]
    fn deserializes_http_body_names() {
        let body = r#"{"page_url":"https://example.com","figma_file_key":"ABC","figma_page_name":"Home","figma_token":"t"}"#;
        let request: ComparisonRequest = serde_json::from_str(body).expect("parse");
        assert!(request.missing_fields().is_empty());

        let partial: ComparisonRequest =
            serde_json::from_str(r#"{"pageUrl":"https://example.com"}"#).expect("parse");
        assert_eq!(partial.missing_fields().len(), 3);
    }

    #[test]
    fn field_names_for_humans_and_wire() {
        assert_eq!(RequestField::DesignAccessToken.to_string(), "designAccessToken");
        assert_eq!(RequestField::DesignAccessToken.wire_name(), "figma_token");
        assert_eq!(RequestField::DesignFrameName.wire_name(), "figma_page_name");
    }
}
