//! Composite constructs and patterns
//!
//! A [`Composite`] groups resource nodes and grant edges behind named
//! outputs. Outputs can only be read once the composite is `ready`.
//! A [`Pattern`] is a composite that also instantiates other composites and
//! wires them together through their public outputs.

use crate::error::{ConstructError, Result};
use crate::grant::{GrantId, GrantRequest};
use crate::resource::{ResourceRef, ResourceSpec};
use crate::stack::Stack;
use crate::tree::{ConstructId, ConstructPath, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructState {
    Uninitialized,
    BaseCreated,
    FlowLogsAttached,
    Ready,
}

impl ConstructState {
    pub fn can_advance_to(self, next: ConstructState) -> bool {
        use ConstructState::*;
        matches!(
            (self, next),
            (Uninitialized, BaseCreated)
                | (BaseCreated, FlowLogsAttached)
                | (BaseCreated, Ready)
                | (FlowLogsAttached, Ready)
        )
    }
}

impl fmt::Display for ConstructState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructState::Uninitialized => write!(f, "uninitialized"),
            ConstructState::BaseCreated => write!(f, "base-created"),
            ConstructState::FlowLogsAttached => write!(f, "flow-logs-attached"),
            ConstructState::Ready => write!(f, "ready"),
        }
    }
}

/// Read-only reference exposed to parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    Resource(ResourceRef),
    Value(String),
}

#[derive(Debug, Clone)]
pub struct Composite {
    id: ConstructId,
    path: ConstructPath,
    state: ConstructState,
    resources: Vec<ResourceRef>,
    grants: Vec<GrantId>,
    outputs: BTreeMap<String, Output>,
}

impl Composite {
    /// Register a composite node named `id` under `parent`
    pub fn declare(stack: &mut Stack, parent: ConstructId, id: &str, tag: &str) -> Result<Self> {
        Self::register(stack, parent, id, NodeKind::Composite(tag.to_string()))
    }

    fn register(stack: &mut Stack, parent: ConstructId, id: &str, kind: NodeKind) -> Result<Self> {
        let handle = stack.add_construct(parent, id, kind)?;
        Ok(Self {
            id: handle,
            path: stack.path(handle).clone(),
            state: ConstructState::Uninitialized,
            resources: Vec::new(),
            grants: Vec::new(),
            outputs: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> ConstructId {
        self.id
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn state(&self) -> ConstructState {
        self.state
    }

    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    pub fn grants(&self) -> &[GrantId] {
        &self.grants
    }

    pub fn advance(&mut self, next: ConstructState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(ConstructError::InvalidTransition {
                construct: self.path.to_string(),
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("{}: {} -> {}", self.path, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Create a resource owned by this composite
    pub fn create(
        &mut self,
        stack: &mut Stack,
        id: &str,
        spec: ResourceSpec,
    ) -> Result<ResourceRef> {
        let resource = stack.create(self.id, id, spec)?;
        self.resources.push(resource);
        Ok(resource)
    }

    /// Record a grant edge owned by this composite
    pub fn grant(&mut self, stack: &mut Stack, request: GrantRequest) -> Result<GrantId> {
        let grant = stack.grant(self.id, request)?;
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
        Ok(grant)
    }

    pub fn expose(&mut self, name: impl Into<String>, output: Output) {
        self.outputs.insert(name.into(), output);
    }

    pub fn expose_resource(&mut self, name: impl Into<String>, resource: ResourceRef) {
        self.expose(name, Output::Resource(resource));
    }

    pub fn expose_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.expose(name, Output::Value(value.into()));
    }

    /// Move to `ready`. A composite without outputs is rejected.
    pub fn finish(&mut self) -> Result<()> {
        if self.outputs.is_empty() {
            return Err(ConstructError::NoOutputs {
                construct: self.path.to_string(),
            });
        }
        self.advance(ConstructState::Ready)?;
        tracing::info!(
            "{} ready: {} resources, {} outputs",
            self.path,
            self.resources.len(),
            self.outputs.len()
        );
        Ok(())
    }

    pub fn require_ready(&self) -> Result<()> {
        if self.state == ConstructState::Ready {
            Ok(())
        } else {
            Err(ConstructError::NotReady {
                construct: self.path.to_string(),
                state: self.state,
            })
        }
    }

    pub fn outputs(&self) -> Result<&BTreeMap<String, Output>> {
        self.require_ready()?;
        Ok(&self.outputs)
    }

    pub fn output(&self, name: &str) -> Result<&Output> {
        self.outputs()?
            .get(name)
            .ok_or_else(|| ConstructError::UnknownOutput {
                construct: self.path.to_string(),
                output: name.to_string(),
            })
    }

    pub fn resource_output(&self, name: &str) -> Result<ResourceRef> {
        match self.output(name)? {
            Output::Resource(resource) => Ok(*resource),
            Output::Value(_) => Err(self.wrong_output(name)),
        }
    }

    pub fn value_output(&self, name: &str) -> Result<&str> {
        match self.output(name)? {
            Output::Value(value) => Ok(value),
            Output::Resource(_) => Err(self.wrong_output(name)),
        }
    }

    fn wrong_output(&self, name: &str) -> ConstructError {
        ConstructError::UnknownOutput {
            construct: self.path.to_string(),
            output: name.to_string(),
        }
    }
}

/// Public contract of every composite
pub trait Construct {
    fn composite(&self) -> &Composite;

    fn id(&self) -> ConstructId {
        self.composite().id()
    }

    fn path(&self) -> &ConstructPath {
        self.composite().path()
    }

    fn output(&self, name: &str) -> Result<&Output> {
        self.composite().output(name)
    }
}

/// A composite of composites
#[derive(Debug, Clone)]
pub struct Pattern {
    inner: Composite,
    children: Vec<ConstructId>,
}

impl Pattern {
    pub fn declare(stack: &mut Stack, parent: ConstructId, id: &str, tag: &str) -> Result<Self> {
        Ok(Self {
            inner: Composite::register(stack, parent, id, NodeKind::Pattern(tag.to_string()))?,
            children: Vec::new(),
        })
    }

    /// Record a child composite, in instantiation order
    pub fn adopt(&mut self, child: &impl Construct) {
        self.children.push(child.id());
    }

    pub fn children(&self) -> &[ConstructId] {
        &self.children
    }

    pub fn composite_mut(&mut self) -> &mut Composite {
        &mut self.inner
    }
}

impl Construct for Pattern {
    fn composite(&self) -> &Composite {
        &self.inner
    }
}

impl Construct for Composite {
    fn composite(&self) -> &Composite {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    #[test]
    fn test_outputs_not_readable_before_ready() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut composite = Composite::declare(&mut stack, root, "Net", "network").unwrap();
        let vpc = composite
            .create(&mut stack, "VPC", ResourceSpec::new(ResourceKind::Network))
            .unwrap();
        composite.expose_resource("vpc", vpc);

        assert!(matches!(
            composite.output("vpc"),
            Err(ConstructError::NotReady {
                state: ConstructState::Uninitialized,
                ..
            })
        ));

        composite.advance(ConstructState::BaseCreated).unwrap();
        assert!(composite.output("vpc").is_err());
        composite.finish().unwrap();
        assert_eq!(composite.resource_output("vpc").unwrap(), vpc);
    }

    #[test]
    fn test_invalid_transition() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut composite = Composite::declare(&mut stack, root, "C", "x").unwrap();
        composite.expose_value("name", "c");

        assert!(matches!(
            composite.finish(),
            Err(ConstructError::InvalidTransition { .. })
        ));
        assert!(matches!(
            composite.advance(ConstructState::FlowLogsAttached),
            Err(ConstructError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_finish_requires_outputs() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut composite = Composite::declare(&mut stack, root, "C", "x").unwrap();
        composite.advance(ConstructState::BaseCreated).unwrap();
        assert!(matches!(composite.finish(), Err(ConstructError::NoOutputs { .. })));
    }

    #[test]
    fn test_unknown_and_mistyped_outputs() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut composite = Composite::declare(&mut stack, root, "C", "x").unwrap();
        composite.expose_value("name", "c");
        composite.advance(ConstructState::BaseCreated).unwrap();
        composite.finish().unwrap();

        assert_eq!(composite.value_output("name").unwrap(), "c");
        assert!(matches!(
            composite.output("missing"),
            Err(ConstructError::UnknownOutput { .. })
        ));
        assert!(composite.resource_output("name").is_err());
    }

    #[test]
    fn test_pattern_tracks_children_in_order() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut pattern = Pattern::declare(&mut stack, root, "P", "demo").unwrap();
        let a = Composite::declare(&mut stack, pattern.id(), "A", "x").unwrap();
        let b = Composite::declare(&mut stack, pattern.id(), "B", "x").unwrap();
        pattern.adopt(&a);
        pattern.adopt(&b);

        assert_eq!(pattern.children(), &[a.id(), b.id()]);
        assert_eq!(stack.path(b.id()).to_string(), "S/P/B");
    }
}
