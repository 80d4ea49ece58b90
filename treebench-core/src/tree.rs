//! Serializable Tree Shape
//!
//! The describe-phase output: a pure data rendering of a materialized
//! context, safe to print or ship without touching any callbacks.

use serde::{Deserialize, Serialize};

/// Node kind in a rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A grouping context
    Context,
    /// A measured case
    Case,
}

/// One node of a rendered context/case tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node name (dedup suffix included)
    pub name: String,
    /// Node kind
    pub kind: NodeKind,
    /// Full tree path in `a|b|c` form
    pub path: String,
    /// Child nodes in registration order (empty for cases)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}
