//! Outbound interface to the provisioning engine
//!
//! The engine receives one resource declaration per node, dependencies
//! first and otherwise in creation order, followed by one permission
//! declaration per grant edge. Turning these into a change plan is the
//! engine's job.

use crate::error::Result;
use crate::grant::Capability;
use crate::resource::{OptionMap, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provisioning engine abstraction
///
/// Implementations must not assume anything about the order of
/// permissions relative to each other, only that every resource they
/// mention has already been declared.
pub trait Provisioner {
    /// Returns the provisioner name
    fn name(&self) -> &str;

    /// Declare a resource of kind K with resolved options O and dependencies D
    fn declare_resource(&mut self, declaration: &ResourceDeclaration) -> Result<()>;

    /// Declare a permission from a subject to a target
    fn declare_permission(&mut self, declaration: &PermissionDeclaration) -> Result<()>;
}

/// One resource, as handed to the provisioning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    /// Construct path (e.g., "shop/Api/Function/Function")
    pub path: String,

    pub kind: ResourceKind,

    /// Physical name
    pub name: String,

    /// Resolved options
    pub options: OptionMap,

    /// Provider-specific options forwarded verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub passthrough: OptionMap,

    /// Paths of the resources this one depends on
    pub depends_on: Vec<String>,

    pub tags: BTreeMap<String, String>,
}

impl ResourceDeclaration {
    /// Get an option value as a specific type
    pub fn get_option<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// One grant edge, as handed to the provisioning engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDeclaration {
    /// Path of the subject resource, or the external identity
    pub subject: String,

    /// Path of the target resource
    pub target: String,

    pub target_kind: ResourceKind,

    pub capabilities: Vec<Capability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    /// Construct that declared the grant
    pub declared_by: String,
}
