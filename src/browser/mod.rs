//! Headless page capture through Playwright running under Node.js.
//!
//! - [`renderer`] - per-call browser sessions with guaranteed teardown
//! - `playwright` - capture script, error mapping and availability checks

mod playwright;
pub mod renderer;

pub use renderer::{
    PageRenderer, RenderOptions, RenderSession, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_NETWORK_IDLE_TIMEOUT, DEFAULT_PROCESS_TIMEOUT,
};
