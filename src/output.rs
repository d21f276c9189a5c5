use crate::error::ErrorPayload;
use crate::pipeline::ComparisonResult;
use crate::types::ScoringMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version for CLI output payloads.
pub const OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GatewayOutput {
    Compare(CompareOutput),
    Diff(DiffOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    pub page_url: String,
    pub file_key: String,
    pub frame_name: String,
    pub scoring: ScoringMode,
    pub page_image: String,
    pub figma_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_ratio: Option<f64>,
}

impl CompareOutput {
    pub fn from_result(
        result: &ComparisonResult,
        page_url: impl Into<String>,
        file_key: impl Into<String>,
        frame_name: impl Into<String>,
        scoring: ScoringMode,
    ) -> Self {
        Self {
            version: OUTPUT_VERSION.to_string(),
            page_url: page_url.into(),
            file_key: file_key.into(),
            frame_name: frame_name.into(),
            scoring,
            page_image: result.page_image.locator.clone(),
            figma_image: result.design_image.locator.clone(),
            matching_ratio: result.matching_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOutput {
    pub version: String,
    pub left: PathBuf,
    pub right: PathBuf,
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub different_pixels: u64,
    pub anti_aliased_pixels: u64,
    pub matching_ratio: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_under: Option<f64>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub error: ErrorPayload,
}

impl ErrorOutput {
    pub fn new(error: ErrorPayload) -> Self {
        Self {
            version: OUTPUT_VERSION.to_string(),
            error,
        }
    }
}
