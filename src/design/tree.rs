//! Design document tree and frame lookup by name.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response body of the files endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub document: DesignDocument,
}

/// Root of a design file. Its children are the pages of the file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub children: Vec<DesignNode>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub children: Vec<DesignNode>,
}

/// Anything in a design tree that has a name and ordered children.
pub trait TreeNode {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn children(&self) -> &[DesignNode];
}

impl TreeNode for DesignDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[DesignNode] {
        &self.children
    }
}

impl TreeNode for DesignNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[DesignNode] {
        &self.children
    }
}

impl DesignNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DesignNode>) -> Self {
        self.children = children;
        self
    }
}

impl DesignDocument {
    pub fn with_pages(pages: Vec<DesignNode>) -> Self {
        Self {
            id: "0:0".to_string(),
            name: "Document".to_string(),
            node_type: "DOCUMENT".to_string(),
            children: pages,
        }
    }
}

/// Reference to the frame picked out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFrame {
    pub id: String,
    pub name: String,
}

impl ResolvedFrame {
    fn from_node(node: &impl TreeNode) -> Self {
        Self {
            id: node.id().to_string(),
            name: node.name().to_string(),
        }
    }
}

/// How deep the lookup searches below the document root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    /// Only the children of each page (depth exactly two).
    #[default]
    PageChildren,
    /// Breadth-first from depth two downwards.
    Subtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FramePolicy {
    pub scope: SearchScope,
    pub case_sensitive: bool,
}

impl Default for FramePolicy {
    fn default() -> Self {
        Self {
            scope: SearchScope::PageChildren,
            case_sensitive: true,
        }
    }
}

impl FramePolicy {
    fn matches(&self, candidate: &str, target: &str) -> bool {
        if self.case_sensitive {
            candidate == target
        } else {
            candidate.to_lowercase() == target.to_lowercase()
        }
    }
}

/// Find the first frame named `target_name` among the children of the
/// document's pages, in document order.
///
/// Names are compared exactly. Returns `None` when nothing at that depth
/// matches; deeper or shallower nodes with the same name are ignored.
pub fn find_node_by_name(document: &impl TreeNode, target_name: &str) -> Option<ResolvedFrame> {
    find_node_with_policy(document, target_name, FramePolicy::default())
}

pub fn find_node_with_policy(
    document: &impl TreeNode,
    target_name: &str,
    policy: FramePolicy,
) -> Option<ResolvedFrame> {
    let mut depth_two = document
        .children()
        .iter()
        .flat_map(|page| page.children().iter());

    match policy.scope {
        SearchScope::PageChildren => depth_two
            .find(|node| policy.matches(node.name(), target_name))
            .map(ResolvedFrame::from_node),
        SearchScope::Subtree => {
            let mut queue: VecDeque<&DesignNode> = depth_two.collect();
            while let Some(node) = queue.pop_front() {
                if policy.matches(node.name(), target_name) {
                    return Some(ResolvedFrame::from_node(node));
                }
                queue.extend(node.children().iter());
            }
            None
        }
    }
}
