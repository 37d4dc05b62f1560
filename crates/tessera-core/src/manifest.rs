//! Recorded declarations
//!
//! [`Manifest`] is a [`Provisioner`] that keeps every declaration it
//! receives. It doubles as the serialized hand-off format.

use crate::error::Result;
use crate::provider::{PermissionDeclaration, Provisioner, ResourceDeclaration};
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stack: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    pub resources: Vec<ResourceDeclaration>,

    pub permissions: Vec<PermissionDeclaration>,
}

impl Manifest {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            ..Default::default()
        }
    }

    pub fn resource(&self, path: &str) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| r.path == path)
    }

    pub fn resources_by_kind(&self, kind: ResourceKind) -> Vec<&ResourceDeclaration> {
        self.resources.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn summary(&self) -> ManifestSummary {
        let mut by_kind = BTreeMap::new();
        for resource in &self.resources {
            *by_kind.entry(resource.kind).or_insert(0) += 1;
        }
        ManifestSummary {
            by_kind,
            permissions: self.permissions.len(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

impl Provisioner for Manifest {
    fn name(&self) -> &str {
        "manifest"
    }

    fn declare_resource(&mut self, declaration: &ResourceDeclaration) -> Result<()> {
        self.resources.push(declaration.clone());
        Ok(())
    }

    fn declare_permission(&mut self, declaration: &PermissionDeclaration) -> Result<()> {
        self.permissions.push(declaration.clone());
        Ok(())
    }
}

/// Counts of declared resources and permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSummary {
    pub by_kind: BTreeMap<ResourceKind, usize>,
    pub permissions: usize,
}

impl ManifestSummary {
    pub fn resources(&self) -> usize {
        self.by_kind.values().sum()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for ManifestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources ({} kinds), {} permissions",
            self.resources(),
            self.by_kind.len(),
            self.permissions
        )
    }
}
