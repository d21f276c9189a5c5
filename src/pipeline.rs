//! Comparison orchestration: validate, acquire both images concurrently,
//! optionally score, and translate every failure into [`PipelineError`].

use async_trait::async_trait;
use futures::future::try_join;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::browser::PageRenderer;
use crate::comparator::{CompareError, CompareOptions, PixelComparator};
use crate::design::{find_node_with_policy, DesignAuth, DesignClient, DesignFile, FramePolicy};
use crate::error::{ErrorCategory, ErrorPayload, GatewayError, Result};
use crate::request::{ComparisonRequest, RequestField, RequestProblem, ValidatedRequest};
use crate::storage::ScreenshotStore;
use crate::types::{ImageRef, ScoringMode};

pub const PIPELINE_FAILED: &str = "Comparison pipeline failed";
const DESIGN_PREFIX: &str = "figma";

/// Produces a stored raster capture of a web page.
#[async_trait]
pub trait PageCapture: Send + Sync {
    async fn capture(&self, url: &Url) -> Result<ImageRef>;
}

/// The three remote calls of the design path.
#[async_trait]
pub trait DesignSource: Send + Sync {
    async fn fetch_document(&self, file_key: &str, auth: &DesignAuth) -> Result<DesignFile>;
    async fn export_node(&self, file_key: &str, node_id: &str, auth: &DesignAuth)
        -> Result<String>;
    async fn fetch_bytes(&self, url: &str, auth: &DesignAuth) -> Result<Vec<u8>>;
}

#[async_trait]
impl PageCapture for PageRenderer {
    async fn capture(&self, url: &Url) -> Result<ImageRef> {
        self.render_url(url.as_str()).await
    }
}

#[async_trait]
impl DesignSource for DesignClient {
    async fn fetch_document(&self, file_key: &str, auth: &DesignAuth) -> Result<DesignFile> {
        DesignClient::fetch_document(self, file_key, auth).await
    }

    async fn export_node(
        &self,
        file_key: &str,
        node_id: &str,
        auth: &DesignAuth,
    ) -> Result<String> {
        DesignClient::export_node(self, file_key, node_id, auth).await
    }

    async fn fetch_bytes(&self, url: &str, auth: &DesignAuth) -> Result<Vec<u8>> {
        DesignClient::fetch_bytes(self, url, auth).await
    }
}

/// Failure of one comparison, as seen from outside the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<RequestField>),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: RequestField, reason: String },

    #[error("No frame named '{0}' found in the design document")]
    FrameNotFound(String),

    #[error("Comparison pipeline failed: {0}")]
    Acquisition(#[from] GatewayError),

    #[error("Incomparable dimensions: page is {page_width}x{page_height}, design is {design_width}x{design_height}")]
    IncomparableDimensions {
        page_width: u32,
        page_height: u32,
        design_width: u32,
        design_height: u32,
    },
}

fn join_fields(fields: &[RequestField]) -> String {
    fields
        .iter()
        .map(RequestField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<RequestProblem> for PipelineError {
    fn from(problem: RequestProblem) -> Self {
        match problem {
            RequestProblem::Missing(fields) => PipelineError::MissingFields(fields),
            RequestProblem::Invalid { field, reason } => {
                PipelineError::InvalidField { field, reason }
            }
        }
    }
}

impl From<CompareError> for PipelineError {
    fn from(err: CompareError) -> Self {
        match err {
            CompareError::IncomparableDimensions {
                left_width,
                left_height,
                right_width,
                right_height,
            } => PipelineError::IncomparableDimensions {
                page_width: left_width,
                page_height: left_height,
                design_width: right_width,
                design_height: right_height,
            },
            CompareError::Decode(err) => PipelineError::Acquisition(GatewayError::Image(err)),
            CompareError::InvalidThreshold(_) => {
                PipelineError::Acquisition(GatewayError::Config(err.to_string()))
            }
        }
    }
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::MissingFields(_) | PipelineError::InvalidField { .. } => {
                ErrorCategory::Validation
            }
            PipelineError::FrameNotFound(_) => ErrorCategory::NotFound,
            PipelineError::Acquisition(_) => ErrorCategory::Pipeline,
            PipelineError::IncomparableDimensions { .. } => ErrorCategory::Comparison,
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Comparison => 422,
            _ => 500,
        }
    }

    /// Message safe to hand to callers; acquisition causes stay internal.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Acquisition(_) => PIPELINE_FAILED.to_string(),
            other => other.to_string(),
        }
    }

    /// [`public_message`](Self::public_message) with request fields named as
    /// they appear in the HTTP body.
    pub fn wire_message(&self) -> String {
        match self {
            PipelineError::MissingFields(fields) => format!(
                "Missing required fields: {}",
                fields
                    .iter()
                    .map(RequestField::wire_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PipelineError::InvalidField { field, reason } => {
                format!("Invalid {}: {reason}", field.wire_name())
            }
            other => other.public_message(),
        }
    }

    pub fn missing_fields(&self) -> &[RequestField] {
        match self {
            PipelineError::MissingFields(fields) => fields,
            _ => &[],
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload::bare(self.category(), self.public_message());
        payload.missing_fields = self
            .missing_fields()
            .iter()
            .map(|field| field.wire_name().to_string())
            .collect();
        payload
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PipelineOptions {
    pub scoring: ScoringMode,
    #[serde(flatten)]
    pub compare: CompareOptions,
    pub frame_match: FramePolicy,
    /// Accept `file:` page URLs. Keep off when requests come over HTTP.
    pub allow_file_urls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub page_image: ImageRef,
    pub design_image: ImageRef,
    /// Present only when the comparator ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_ratio: Option<f64>,
}

/// Composes page capture, design lookup/export, and scoring into one call.
#[derive(Debug, Clone)]
pub struct ComparisonPipeline<P, D> {
    page: P,
    design: D,
    store: ScreenshotStore,
    options: PipelineOptions,
    comparator: PixelComparator,
}

impl<P: PageCapture, D: DesignSource> ComparisonPipeline<P, D> {
    pub fn new(page: P, design: D, store: ScreenshotStore, options: PipelineOptions) -> Result<Self> {
        let comparator = PixelComparator::new(options.compare)
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        Ok(Self {
            page,
            design,
            store,
            options,
            comparator,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn design(&self) -> &D {
        &self.design
    }

    /// Run one comparison. No partial result is returned on failure.
    pub async fn compare(
        &self,
        request: &ComparisonRequest,
    ) -> std::result::Result<ComparisonResult, PipelineError> {
        let request = request.validate_with(self.options.allow_file_urls)?;
        info!(
            page_url = %request.page_url,
            file_key = %request.file_key,
            frame = %request.frame_name,
            scoring = ?self.options.scoring,
            "starting comparison"
        );

        let staged = StagedCaptures::new(&self.store);
        let page = async {
            let image = self.page.capture(&request.page_url).await?;
            staged.track(&image);
            Ok::<_, PipelineError>(image)
        };
        let design = async {
            let image = self.acquire_design(&request).await?;
            staged.track(&image);
            Ok::<_, PipelineError>(image)
        };
        let (page_image, design_image) = try_join(page, design)
            .await
            .inspect_err(log_failure)?;

        let matching_ratio = if self.options.scoring.is_scored() {
            Some(self.score(&page_image, &design_image).await.inspect_err(log_failure)?)
        } else {
            None
        };

        staged.keep();
        info!(
            page_image = %page_image,
            design_image = %design_image,
            matching_ratio = ?matching_ratio,
            "comparison finished"
        );
        Ok(ComparisonResult {
            page_image,
            design_image,
            matching_ratio,
        })
    }

    /// Resolve the frame, export it, download it, and store it. Each stage
    /// starts only after the previous one succeeded.
    async fn acquire_design(
        &self,
        request: &ValidatedRequest,
    ) -> std::result::Result<ImageRef, PipelineError> {
        let file = self
            .design
            .fetch_document(&request.file_key, &request.auth)
            .await?;

        let frame = find_node_with_policy(
            &file.document,
            &request.frame_name,
            self.options.frame_match,
        )
        .ok_or_else(|| PipelineError::FrameNotFound(request.frame_name.clone()))?;
        debug!(node_id = %frame.id, name = %frame.name, "resolved design frame");

        let image_url = self
            .design
            .export_node(&request.file_key, &frame.id, &request.auth)
            .await?;
        let bytes = self.design.fetch_bytes(&image_url, &request.auth).await?;
        debug!(bytes = bytes.len(), "downloaded design export");

        Ok(self.store.persist(DESIGN_PREFIX, &bytes).await?)
    }

    async fn score(
        &self,
        page_image: &ImageRef,
        design_image: &ImageRef,
    ) -> std::result::Result<f64, PipelineError> {
        let page = tokio::fs::read(&page_image.path)
            .await
            .map_err(GatewayError::from)?;
        let design = tokio::fs::read(&design_image.path)
            .await
            .map_err(GatewayError::from)?;
        let comparator = self.comparator;
        let outcome = tokio::task::spawn_blocking(move || comparator.compare_bytes(&page, &design))
            .await
            .map_err(GatewayError::from)??;
        debug!(
            different = outcome.different_pixels,
            total = outcome.total_pixels,
            "scored captures"
        );
        Ok(outcome.matching_ratio)
    }
}

/// Captures written by one comparison. Unless kept, they are removed when
/// the comparison ends, including when its future is dropped.
struct StagedCaptures<'a> {
    store: &'a ScreenshotStore,
    images: Mutex<Vec<ImageRef>>,
    kept: bool,
}

impl<'a> StagedCaptures<'a> {
    fn new(store: &'a ScreenshotStore) -> Self {
        Self {
            store,
            images: Mutex::new(Vec::new()),
            kept: false,
        }
    }

    fn track(&self, image: &ImageRef) {
        if let Ok(mut images) = self.images.lock() {
            images.push(image.clone());
        }
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for StagedCaptures<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        let images = self.images.get_mut().map(std::mem::take).unwrap_or_default();
        for image in &images {
            self.store.discard(image);
        }
    }
}

fn log_failure(err: &PipelineError) {
    match err {
        PipelineError::Acquisition(cause) => {
            error!(error = %cause, stage = ?cause.design_stage(), "comparison pipeline failed")
        }
        other => info!(error = %other, "comparison rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DesignStage;

    #[test]
    fn acquisition_errors_hide_their_cause() {
        let err = PipelineError::from(GatewayError::design_api(
            DesignStage::Export,
            None,
            "secret token rejected",
        ));
        assert_eq!(err.category(), ErrorCategory::Pipeline);
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), PIPELINE_FAILED);
        assert!(!err.to_payload().message.contains("secret"));
    }

    #[test]
    fn missing_fields_map_to_validation_payload() {
        let err = PipelineError::MissingFields(vec![
            RequestField::PageUrl,
            RequestField::DesignAccessToken,
        ]);
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.public_message(),
            "Missing required fields: pageUrl, designAccessToken"
        );
        assert_eq!(err.to_payload().missing_fields, vec!["page_url", "figma_token"]);
        assert_eq!(
            err.wire_message(),
            "Missing required fields: page_url, figma_token"
        );
    }

    #[test]
    fn dimension_mismatch_is_its_own_category() {
        let err = PipelineError::from(CompareError::IncomparableDimensions {
            left_width: 1440,
            left_height: 3000,
            right_width: 1440,
            right_height: 900,
        });
        assert_eq!(err.category(), ErrorCategory::Comparison);
        assert_eq!(err.status_code(), 422);
        assert!(err.public_message().contains("1440x3000"));
    }

    #[test]
    fn frame_not_found_is_user_facing() {
        let err = PipelineError::FrameNotFound("Homepage".into());
        assert_eq!(err.status_code(), 404);
        assert!(err.public_message().contains("Homepage"));
    }

    #[test]
    fn options_parse_with_flattened_comparison_settings() {
        let options: PipelineOptions = toml::from_str(
            r#"
            scoring = "score"
            threshold = 0.2
            frame_match = { scope = "subtree", case_sensitive = false }
            "#,
        )
        .expect("parse");
        assert!(options.scoring.is_scored());
        assert_eq!(options.compare.threshold, 0.2);
        assert!(!options.frame_match.case_sensitive);
    }
}
