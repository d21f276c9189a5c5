//! Small value types shared across the gateway.
//!
//! - [`Viewport`] - browser viewport used for page captures
//! - [`ImageRef`] - resolvable reference to a stored capture
//! - [`ScoringMode`] - whether the pipeline runs the comparator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("Invalid viewport '{0}': expected WIDTHxHEIGHT (e.g., 1440x900)")]
    InvalidFormat(String),
    #[error("Viewport dimensions must be positive, got {0}")]
    Empty(String),
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ViewportParseError::InvalidFormat(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(ViewportParseError::Empty(s.to_string()));
        }
        Ok(Viewport { width, height })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A stored image: where it lives on disk and how callers can resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Public locator (URL under the configured base, or the local path).
    pub locator: String,
    /// Local file backing the locator.
    pub path: PathBuf,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}

/// Whether a comparison request also scores the two captures.
///
/// `CaptureOnly` returns the two image references without invoking the
/// comparator (diagnostic capture); `Score` adds a matching ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    #[default]
    CaptureOnly,
    Score,
}

impl ScoringMode {
    pub fn is_scored(self) -> bool {
        matches!(self, ScoringMode::Score)
    }
}
