//! Construct tree
//!
//! Append-only ownership hierarchy. Every construct and resource is
//! registered under an explicit parent handle; there is no ambient scope
//! and no deletion.

use crate::error::{ConstructError, Result};
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PATH_SEPARATOR: char = '/';

/// Handle to a node in a [`ConstructTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructId(usize);

/// Ids from the root down to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConstructPath(Vec<String>);

impl ConstructPath {
    pub fn root(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(id.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last id of the path
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    pub fn starts_with(&self, prefix: &ConstructPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(&PATH_SEPARATOR.to_string()))
    }
}

impl From<ConstructPath> for String {
    fn from(path: ConstructPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for ConstructPath {
    type Error = ConstructError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl std::str::FromStr for ConstructPath {
    type Err = ConstructError;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<String> = s.split(PATH_SEPARATOR).map(str::to_string).collect();
        for segment in &segments {
            validate_id(segment)?;
        }
        Ok(Self(segments))
    }
}

/// What a tree node stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "tag", rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Composite(String),
    Pattern(String),
    Resource(ResourceKind),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Composite(tag) => write!(f, "composite:{}", tag),
            NodeKind::Pattern(tag) => write!(f, "pattern:{}", tag),
            NodeKind::Resource(kind) => write!(f, "resource:{}", kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub path: ConstructPath,
    pub kind: NodeKind,
    pub parent: Option<ConstructId>,
    children: BTreeMap<String, ConstructId>,
}

impl TreeNode {
    pub fn children(&self) -> impl Iterator<Item = (&str, ConstructId)> {
        self.children.iter().map(|(id, child)| (id.as_str(), *child))
    }

    pub fn child(&self, id: &str) -> Option<ConstructId> {
        self.children.get(id).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ConstructTree {
    nodes: Vec<TreeNode>,
}

impl ConstructTree {
    /// Create a tree holding only its root
    pub fn new(root_id: &str) -> Result<Self> {
        validate_id(root_id)?;
        Ok(Self {
            nodes: vec![TreeNode {
                path: ConstructPath::root(root_id),
                kind: NodeKind::Root,
                parent: None,
                children: BTreeMap::new(),
            }],
        })
    }

    pub fn root(&self) -> ConstructId {
        ConstructId(0)
    }

    /// Register `id` under `parent`
    pub fn register(
        &mut self,
        parent: ConstructId,
        id: &str,
        kind: NodeKind,
    ) -> Result<ConstructId> {
        validate_id(id)?;

        let parent_node = self
            .nodes
            .get(parent.0)
            .ok_or_else(|| ConstructError::ParentNotFound(format!("#{}", parent.0)))?;

        if parent_node.children.contains_key(id) {
            return Err(ConstructError::DuplicateId {
                parent: parent_node.path.to_string(),
                id: id.to_string(),
            });
        }

        let handle = ConstructId(self.nodes.len());
        let path = parent_node.path.child(id);
        tracing::debug!("Registered {} ({})", path, kind);

        self.nodes[parent.0].children.insert(id.to_string(), handle);
        self.nodes.push(TreeNode {
            path,
            kind,
            parent: Some(parent),
            children: BTreeMap::new(),
        });
        Ok(handle)
    }

    /// Register `id` under the node at `parent_path`
    pub fn register_at(
        &mut self,
        parent_path: &ConstructPath,
        id: &str,
        kind: NodeKind,
    ) -> Result<ConstructId> {
        let parent = self
            .find(parent_path)
            .ok_or_else(|| ConstructError::ParentNotFound(parent_path.to_string()))?;
        self.register(parent, id, kind)
    }

    pub fn node(&self, id: ConstructId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Path of a node. Handles are only minted by this tree, so a foreign
    /// handle falls back to the root path.
    pub fn path(&self, id: ConstructId) -> &ConstructPath {
        self.nodes
            .get(id.0)
            .map(|n| &n.path)
            .unwrap_or(&self.nodes[0].path)
    }

    pub fn find(&self, path: &ConstructPath) -> Option<ConstructId> {
        let mut segments = path.segments().iter();
        let root = &self.nodes[0];
        if segments.next() != root.path.segments().first() {
            return None;
        }

        let mut current = self.root();
        for segment in segments {
            current = self.nodes[current.0].child(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, id: ConstructId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ConstructId, &TreeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ConstructId(i), n))
    }
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ConstructError::InvalidId {
            id: id.to_string(),
            reason: "id must not be empty",
        });
    }
    if id.contains(PATH_SEPARATOR) {
        return Err(ConstructError::InvalidId {
            id: id.to_string(),
            reason: "id must not contain '/'",
        });
    }
    Ok(())
}
