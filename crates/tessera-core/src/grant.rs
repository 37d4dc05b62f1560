//! Grant edges
//!
//! A grant records the intent that a subject may use some capabilities of a
//! target. The permission document itself is written by the provisioning
//! engine; this layer only validates and records.

use crate::error::{ConstructError, Result};
use crate::resource::{ResourceKind, ResourceRef};
use crate::tree::ConstructId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Invoke,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Read => write!(f, "read"),
            Capability::Write => write!(f, "write"),
            Capability::Invoke => write!(f, "invoke"),
        }
    }
}

/// Capabilities a target kind can grant
pub fn supported_capabilities(kind: ResourceKind) -> &'static [Capability] {
    match kind {
        ResourceKind::Table | ResourceKind::StorageBucket => &[Capability::Read, Capability::Write],
        ResourceKind::Function | ResourceKind::Api => &[Capability::Invoke],
        _ => &[],
    }
}

/// Identity receiving a grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// A declared resource (its execution identity)
    Resource(ResourceRef),
    /// An identity declared outside this stack, e.g. an account or role ARN
    External(String),
}

impl From<ResourceRef> for Principal {
    fn from(resource: ResourceRef) -> Self {
        Principal::Resource(resource)
    }
}

/// Handle to a recorded grant edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(usize);

#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub subject: Principal,
    pub target: ResourceRef,
    pub capabilities: BTreeSet<Capability>,
    pub justification: Option<String>,
}

impl GrantRequest {
    pub fn new(subject: impl Into<Principal>, target: ResourceRef) -> Self {
        Self {
            subject: subject.into(),
            target,
            capabilities: BTreeSet::new(),
            justification: None,
        }
    }

    pub fn allow(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn allow_all(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn justify(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEdge {
    pub subject: Principal,
    pub target: ResourceRef,
    pub capabilities: BTreeSet<Capability>,
    /// Advisory only
    pub justification: Option<String>,
    /// Construct that first declared the edge
    #[serde(skip)]
    pub(crate) owner: Option<ConstructId>,
}

impl GrantEdge {
    pub fn owner(&self) -> Option<ConstructId> {
        self.owner
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// All grant edges of a stack, one per (subject, target) pair
#[derive(Debug, Clone, Default)]
pub struct GrantLedger {
    edges: Vec<GrantEdge>,
    index: BTreeMap<(Principal, ResourceRef), GrantId>,
}

impl GrantLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record `request`. `target_path` only feeds error messages.
    pub fn grant(
        &mut self,
        owner: ConstructId,
        request: GrantRequest,
        target_path: &str,
    ) -> Result<GrantId> {
        let kind = request.target.kind();

        if request.capabilities.is_empty() {
            return Err(ConstructError::EmptyGrant {
                target: target_path.to_string(),
            });
        }

        let supported = supported_capabilities(kind);
        if let Some(capability) = request.capabilities.iter().find(|c| !supported.contains(*c)) {
            return Err(ConstructError::UnsupportedCapability {
                target: target_path.to_string(),
                kind,
                capability: *capability,
            });
        }

        let key = (request.subject.clone(), request.target);
        if let Some(id) = self.index.get(&key) {
            let edge = &mut self.edges[id.0];
            edge.capabilities.extend(request.capabilities);
            if edge.justification.is_none() {
                edge.justification = request.justification;
            }
            tracing::debug!("Merged grant on {} into edge #{}", target_path, id.0);
            return Ok(*id);
        }

        let id = GrantId(self.edges.len());
        tracing::debug!(
            "Granted {:?} on {} ({} edges)",
            request.capabilities,
            target_path,
            self.edges.len() + 1
        );
        self.edges.push(GrantEdge {
            subject: request.subject,
            target: request.target,
            capabilities: request.capabilities,
            justification: request.justification,
            owner: Some(owner),
        });
        self.index.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: GrantId) -> Option<&GrantEdge> {
        self.edges.get(id.0)
    }

    pub fn edges(&self) -> &[GrantEdge] {
        &self.edges
    }

    pub fn owned_by(&self, owner: ConstructId) -> impl Iterator<Item = &GrantEdge> {
        self.edges.iter().filter(move |e| e.owner == Some(owner))
    }

    pub fn edge_between(&self, subject: &Principal, target: ResourceRef) -> Option<&GrantEdge> {
        self.index
            .get(&(subject.clone(), target))
            .and_then(|id| self.edges.get(id.0))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConstructTree;

    fn owner() -> ConstructId {
        ConstructTree::new("S").unwrap().root()
    }

    fn table() -> ResourceRef {
        ResourceRef::new(0, ResourceKind::Table)
    }

    fn function() -> ResourceRef {
        ResourceRef::new(1, ResourceKind::Function)
    }

    #[test]
    fn test_regrant_is_idempotent() {
        let mut ledger = GrantLedger::new();
        let a = ledger
            .grant(owner(), GrantRequest::new(function(), table()).allow(Capability::Read), "S/T")
            .unwrap();
        let b = ledger
            .grant(owner(), GrantRequest::new(function(), table()).allow(Capability::Read), "S/T")
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.edges()[0].capabilities,
            BTreeSet::from([Capability::Read])
        );
    }

    #[test]
    fn test_capabilities_union_per_pair() {
        let mut ledger = GrantLedger::new();
        ledger
            .grant(owner(), GrantRequest::new(function(), table()).allow(Capability::Read), "S/T")
            .unwrap();
        ledger
            .grant(owner(), GrantRequest::new(function(), table()).allow(Capability::Write), "S/T")
            .unwrap();

        let edge = ledger.edge_between(&function().into(), table()).unwrap();
        assert!(edge.allows(Capability::Read));
        assert!(edge.allows(Capability::Write));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_distinct_subjects_get_distinct_edges() {
        let mut ledger = GrantLedger::new();
        ledger
            .grant(owner(), GrantRequest::new(function(), table()).allow(Capability::Read), "S/T")
            .unwrap();
        ledger
            .grant(
                owner(),
                GrantRequest::new(Principal::External("arn:aws:iam::1:role/x".into()), table())
                    .allow(Capability::Write),
                "S/T",
            )
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_invoke_on_network_rejected() {
        let mut ledger = GrantLedger::new();
        let network = ResourceRef::new(2, ResourceKind::Network);
        let err = ledger
            .grant(
                owner(),
                GrantRequest::new(function(), network).allow(Capability::Invoke),
                "S/Net",
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructError::UnsupportedCapability {
                capability: Capability::Invoke,
                kind: ResourceKind::Network,
                ..
            }
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_invoke_on_function_accepted() {
        let mut ledger = GrantLedger::new();
        let result = ledger.grant(
            owner(),
            GrantRequest::new(table(), function()).allow(Capability::Invoke),
            "S/F",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_grant_rejected() {
        let mut ledger = GrantLedger::new();
        assert!(matches!(
            ledger.grant(owner(), GrantRequest::new(function(), table()), "S/T"),
            Err(ConstructError::EmptyGrant { .. })
        ));
    }

    #[test]
    fn test_read_on_function_rejected() {
        let mut ledger = GrantLedger::new();
        assert!(matches!(
            ledger.grant(
                owner(),
                GrantRequest::new(table(), function()).allow(Capability::Read),
                "S/F",
            ),
            Err(ConstructError::UnsupportedCapability { .. })
        ));
    }
}
