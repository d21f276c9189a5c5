//! Parity Gateway library
//!
//! Captures a live web page and the matching frame of a design file, and
//! optionally scores how closely the two images match.
//!
//! # Module Overview
//!
//! - [`design`] - design document types, frame lookup and the REST client
//! - [`browser`] - full-page capture through Playwright
//! - [`comparator`] - perceptual per-pixel comparison
//! - [`pipeline`] - the comparison orchestrator and its capability traits
//! - [`server`] - HTTP routes for the gateway
//! - [`config`] - configuration file and environment support
//! - [`output`] - JSON output schemas for the CLI
//!
//! # Example
//!
//! ```no_run
//! use parity_gateway::{ComparisonPipeline, ComparisonRequest, Config};
//!
//! # async fn example() -> parity_gateway::Result<()> {
//! let config = Config::load(None)?;
//! let store = config.screenshot_store();
//! let pipeline = ComparisonPipeline::new(
//!     config.page_renderer(store.clone()),
//!     config.design_client()?,
//!     store,
//!     config.comparison,
//! )?;
//!
//! let request = ComparisonRequest::new("https://example.com", "ABC123", "Homepage", "token");
//! match pipeline.compare(&request).await {
//!     Ok(result) => println!("{} vs {}", result.page_image, result.design_image),
//!     Err(err) => eprintln!("{}", err.public_message()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod comparator;
pub mod config;
pub mod design;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod storage;
pub mod types;

pub use browser::{PageRenderer, RenderOptions};
pub use comparator::{CompareError, CompareOptions, CompareOutcome, PixelComparator};
pub use config::Config;
pub use design::{
    find_node_by_name, find_node_with_policy, DesignAuth, DesignClient, DesignDocument,
    DesignFile, DesignNode, FramePolicy, ResolvedFrame, SearchScope,
};
pub use error::{DesignStage, ErrorCategory, ErrorPayload, GatewayError, Result};
pub use output::{CompareOutput, DiffOutput, ErrorOutput, GatewayOutput, OUTPUT_VERSION};
pub use pipeline::{
    ComparisonPipeline, ComparisonResult, DesignSource, PageCapture, PipelineError,
    PipelineOptions,
};
pub use request::{ComparisonRequest, RequestField};
pub use storage::ScreenshotStore;
pub use types::{ImageRef, ScoringMode, Viewport};
