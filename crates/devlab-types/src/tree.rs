//! File-tree nodes
//!
//! Nodes reference each other by path rather than by containment, so a
//! consumer can re-resolve the hierarchy with a single path index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Regular file (and anything that is not a directory)
    File,
    /// Directory
    Folder,
}

impl NodeType {
    /// Map a `find -printf %y` type letter
    #[inline]
    #[must_use]
    pub fn from_find_tag(tag: &str) -> Self {
        if tag == "d" {
            NodeType::Folder
        } else {
            NodeType::File
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::File => f.write_str("file"),
            NodeType::Folder => f.write_str("folder"),
        }
    }
}

/// One entry of a workspace tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Absolute path inside the sandbox
    pub path: String,
    /// Entry kind
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Path equals the tree root
    #[serde(rename = "isRoot")]
    pub is_root: bool,
    /// Paths of immediate children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Editor hint: expanded in the file browser
    #[serde(rename = "isOpen", default)]
    pub is_open: bool,
    /// Editor hint: no unsaved edits
    #[serde(rename = "isSaved", default)]
    pub is_saved: bool,
}

impl FileNode {
    /// New childless node
    #[must_use]
    pub fn new(path: impl Into<String>, node_type: NodeType, is_root: bool) -> Self {
        Self {
            path: path.into(),
            node_type,
            is_root,
            children: Vec::new(),
            is_open: false,
            is_saved: true,
        }
    }

    /// Whether this node is a directory
    #[inline]
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }
}
