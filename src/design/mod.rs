//! Design-service integration.
//!
//! - [`tree`] - design document types and frame lookup by name
//! - [`client`] - REST client for document fetch, frame export and download

pub mod client;
pub mod tree;

pub use client::{DesignAuth, DesignClient, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use tree::{
    find_node_by_name, find_node_with_policy, DesignDocument, DesignFile, DesignNode,
    FramePolicy, ResolvedFrame, SearchScope, TreeNode,
};
