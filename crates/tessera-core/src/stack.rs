//! Declaration context
//!
//! A [`Stack`] owns the construct tree, every resource node and the grant
//! ledger. All declarations go through `&mut Stack`; callers always pass
//! the parent handle explicitly.

use crate::error::{ConstructError, Result};
use crate::grant::{GrantId, GrantLedger, GrantRequest, Principal};
use crate::manifest::Manifest;
use crate::provider::{PermissionDeclaration, Provisioner, ResourceDeclaration};
use crate::resource::{
    OptionShape, ResourceNode, ResourceRef, ResourceSpec, option_spec, recognized_elsewhere,
};
use crate::tree::{ConstructId, ConstructPath, ConstructTree, NodeKind, validate_id};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tessera_config::Settings;

pub const MANAGED_BY_TAG: &str = "ManagedBy";
pub const MANAGED_BY_VALUE: &str = "tessera";

#[derive(Debug, Clone)]
pub struct Stack {
    tree: ConstructTree,
    resources: Vec<ResourceNode>,
    grants: GrantLedger,
    standard_tags: BTreeMap<String, String>,
    region: Option<String>,
    account: Option<String>,
}

impl Stack {
    pub fn new(name: &str) -> Result<Self> {
        let mut standard_tags = BTreeMap::new();
        standard_tags.insert(MANAGED_BY_TAG.to_string(), MANAGED_BY_VALUE.to_string());
        Ok(Self {
            tree: ConstructTree::new(name)?,
            resources: Vec::new(),
            grants: GrantLedger::new(),
            standard_tags,
            region: None,
            account: None,
        })
    }

    /// Stack named and tagged by `settings`; configured tags win over the
    /// standard `ManagedBy` tag
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut stack = Self::new(&settings.stack)?;
        stack.standard_tags.extend(settings.tags.clone());
        stack.region = settings.region.clone();
        stack.account = settings.account.clone();
        Ok(stack)
    }

    /// Stack from the discovered `tessera.kdl`
    pub fn load() -> Result<Self> {
        let settings = tessera_config::load_settings()?;
        Self::from_settings(&settings)
    }

    pub fn name(&self) -> &str {
        self.tree.path(self.tree.root()).id()
    }

    pub fn root(&self) -> ConstructId {
        self.tree.root()
    }

    pub fn tree(&self) -> &ConstructTree {
        &self.tree
    }

    pub fn path(&self, id: ConstructId) -> &ConstructPath {
        self.tree.path(id)
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn standard_tags(&self) -> &BTreeMap<String, String> {
        &self.standard_tags
    }

    /// Register a composite or pattern node
    pub fn add_construct(
        &mut self,
        parent: ConstructId,
        id: &str,
        kind: NodeKind,
    ) -> Result<ConstructId> {
        self.tree.register(parent, id, kind)
    }

    /// Create one resource node under `parent`
    ///
    /// Options are resolved before the node is registered, so a rejected
    /// spec leaves the tree untouched.
    pub fn create(
        &mut self,
        parent: ConstructId,
        id: &str,
        spec: ResourceSpec,
    ) -> Result<ResourceRef> {
        validate_id(id)?;
        if !self.tree.contains(parent) {
            return Err(ConstructError::ParentNotFound(format!("{:?}", parent)));
        }

        let mut spec = spec;
        let mut depends_on = Vec::new();
        for (option, target) in std::mem::take(&mut spec.references) {
            let value = self.resource(target)?.reference_value();
            spec.overrides.insert(option, value);
            push_unique(&mut depends_on, target);
        }
        for target in std::mem::take(&mut spec.depends_on) {
            self.resource(target)?;
            push_unique(&mut depends_on, target);
        }

        let path = self.tree.path(parent).child(id);
        let mut node = ResourceNode::resolve(path, &spec)?;
        let construct = self.tree.register(parent, id, NodeKind::Resource(spec.kind))?;

        node.construct = Some(construct);
        node.owner = Some(parent);
        node.depends_on = depends_on;
        node.tags = self.standard_tags.clone();

        let handle = ResourceRef::new(self.resources.len(), spec.kind);
        tracing::debug!(
            "Created {} {} ({} options, {} dependencies)",
            node.kind,
            node.path,
            node.options.len(),
            node.depends_on.len()
        );
        self.resources.push(node);
        Ok(handle)
    }

    pub fn resource(&self, resource: ResourceRef) -> Result<&ResourceNode> {
        self.resources
            .get(resource.index())
            .filter(|node| node.kind == resource.kind())
            .ok_or_else(|| unknown(resource))
    }

    fn resource_mut(&mut self, resource: ResourceRef) -> Result<&mut ResourceNode> {
        self.resources
            .get_mut(resource.index())
            .filter(|node| node.kind == resource.kind())
            .ok_or_else(|| unknown(resource))
    }

    /// Resources in creation order
    pub fn resources(&self) -> impl Iterator<Item = (ResourceRef, &ResourceNode)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, node)| (ResourceRef::new(i, node.kind), node))
    }

    /// Resources registered directly under `owner`
    pub fn resources_owned_by(&self, owner: ConstructId) -> Vec<ResourceRef> {
        self.resources()
            .filter(|(_, node)| node.owner == Some(owner))
            .map(|(r, _)| r)
            .collect()
    }

    pub fn find_resource(&self, path: &ConstructPath) -> Option<ResourceRef> {
        self.resources().find(|(_, node)| &node.path == path).map(|(r, _)| r)
    }

    /// Option value pointing at `resource`
    pub fn reference(&self, resource: ResourceRef) -> Result<Value> {
        Ok(self.resource(resource)?.reference_value())
    }

    /// Append to a list-shaped option
    pub fn append_option(
        &mut self,
        resource: ResourceRef,
        option: &str,
        value: Value,
    ) -> Result<()> {
        let node = self.resource_mut(resource)?;
        expect_shape(node, option, OptionShape::List)?;

        let entry = node.options.entry(option.to_string()).or_insert_with(|| json!([]));
        match entry.as_array_mut() {
            Some(items) => items.push(value),
            None => return Err(immutable(node, option)),
        }
        tracing::debug!("Appended to {}.{}", node.path, option);
        Ok(())
    }

    /// Append a reference to another node to a list-shaped option and depend on it
    pub fn append_reference(
        &mut self,
        resource: ResourceRef,
        option: &str,
        target: ResourceRef,
    ) -> Result<()> {
        self.check_dependency(resource, target)?;
        let value = self.reference(target)?;
        self.append_option(resource, option, value)?;
        let node = self.resource_mut(resource)?;
        push_unique(&mut node.depends_on, target);
        Ok(())
    }

    /// Add a dependency edge after creation. An edge that would close a
    /// cycle is rejected.
    pub fn add_dependency(&mut self, resource: ResourceRef, target: ResourceRef) -> Result<()> {
        self.check_dependency(resource, target)?;
        let dependency = self.resource(target)?.path.to_string();
        let node = self.resource_mut(resource)?;
        push_unique(&mut node.depends_on, target);
        tracing::debug!("{} now depends on {}", node.path, dependency);
        Ok(())
    }

    fn check_dependency(&self, resource: ResourceRef, target: ResourceRef) -> Result<()> {
        let dependency = self.resource(target)?;
        let node = self.resource(resource)?;
        if resource == target {
            return Err(ConstructError::InvalidOption {
                node: node.path.to_string(),
                option: "depends_on".to_string(),
                reason: "a resource cannot depend on itself".to_string(),
            });
        }
        if self.depends_on_transitively(target, resource) {
            return Err(ConstructError::DependencyCycle {
                node: node.path.to_string(),
                dependency: dependency.path.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `from` reaches `to` through dependency edges
    fn depends_on_transitively(&self, from: ResourceRef, to: ResourceRef) -> bool {
        let mut pending = vec![from.index()];
        let mut seen = BTreeSet::new();
        while let Some(index) = pending.pop() {
            if index == to.index() {
                return true;
            }
            if !seen.insert(index) {
                continue;
            }
            if let Some(node) = self.resources.get(index) {
                pending.extend(node.depends_on.iter().map(|r| r.index()));
            }
        }
        false
    }

    /// Insert a new key into a map-shaped option. Existing keys are never replaced.
    pub fn insert_option_entry(
        &mut self,
        resource: ResourceRef,
        option: &str,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let node = self.resource_mut(resource)?;
        expect_shape(node, option, OptionShape::Map)?;

        let entry = node.options.entry(option.to_string()).or_insert_with(|| json!({}));
        let Some(map) = entry.as_object_mut() else {
            return Err(immutable(node, option));
        };
        if map.contains_key(key) {
            return Err(ConstructError::DuplicateEntry {
                node: node.path.to_string(),
                option: option.to_string(),
                key: key.to_string(),
            });
        }
        map.insert(key.to_string(), value);
        tracing::debug!("Inserted {} into {}.{}", key, node.path, option);
        Ok(())
    }

    /// Add a tag. Re-adding the same value is a no-op; a different value is rejected.
    pub fn tag(&mut self, resource: ResourceRef, key: &str, value: &str) -> Result<()> {
        let node = self.resource_mut(resource)?;
        match node.tags.get(key) {
            Some(existing) if existing == value => Ok(()),
            Some(_) => Err(ConstructError::DuplicateEntry {
                node: node.path.to_string(),
                option: "tags".to_string(),
                key: key.to_string(),
            }),
            None => {
                node.tags.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Record a grant edge owned by `owner`
    pub fn grant(&mut self, owner: ConstructId, request: GrantRequest) -> Result<GrantId> {
        if !self.tree.contains(owner) {
            return Err(ConstructError::ParentNotFound(format!("{:?}", owner)));
        }
        if let Principal::Resource(subject) = &request.subject {
            self.resource(*subject)?;
        }
        let target_path = self.resource(request.target)?.path.to_string();
        self.grants.grant(owner, request, &target_path)
    }

    pub fn grants(&self) -> &GrantLedger {
        &self.grants
    }

    /// Hand every declaration to `provisioner`: resources with dependencies
    /// first (otherwise in creation order), then permissions
    pub fn synthesize<P: Provisioner + ?Sized>(&self, provisioner: &mut P) -> Result<()> {
        for index in self.synthesis_order()? {
            let node = &self.resources[index];
            let depends_on = node
                .depends_on
                .iter()
                .map(|r| self.resource(*r).map(|d| d.path.to_string()))
                .collect::<Result<Vec<_>>>()?;

            provisioner.declare_resource(&ResourceDeclaration {
                path: node.path.to_string(),
                kind: node.kind,
                name: node.name.clone(),
                options: node.options.clone(),
                passthrough: node.passthrough.clone(),
                depends_on,
                tags: node.tags.clone(),
            })?;
        }

        for edge in self.grants.edges() {
            let subject = match &edge.subject {
                Principal::Resource(r) => self.resource(*r)?.path.to_string(),
                Principal::External(identity) => identity.clone(),
            };
            let declared_by = edge
                .owner()
                .map(|o| self.path(o).to_string())
                .unwrap_or_else(|| self.name().to_string());

            provisioner.declare_permission(&PermissionDeclaration {
                subject,
                target: self.resource(edge.target)?.path.to_string(),
                target_kind: edge.target.kind(),
                capabilities: edge.capabilities.iter().copied().collect(),
                justification: edge.justification.clone(),
                declared_by,
            })?;
        }

        tracing::info!(
            "Synthesized stack '{}' into {}: {} resources, {} permissions",
            self.name(),
            provisioner.name(),
            self.resources.len(),
            self.grants.len()
        );
        Ok(())
    }

    /// Node indices with every dependency ahead of its dependents. Among
    /// nodes whose dependencies are all declared, the earliest created goes
    /// first.
    fn synthesis_order(&self) -> Result<Vec<usize>> {
        let mut remaining: Vec<usize> = self.resources.iter().map(|n| n.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];
        for (index, node) in self.resources.iter().enumerate() {
            for dependency in &node.depends_on {
                self.resource(*dependency)?;
                dependents[dependency.index()].push(index);
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.resources.len())
            .filter(|i| remaining[*i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.resources.len());
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if let Some(stuck) = (0..self.resources.len()).find(|i| remaining[*i] > 0) {
            let node = &self.resources[stuck];
            let dependency = node
                .depends_on
                .iter()
                .find(|d| remaining[d.index()] > 0)
                .map(|d| self.resources[d.index()].path.to_string())
                .unwrap_or_default();
            return Err(ConstructError::DependencyCycle {
                node: node.path.to_string(),
                dependency,
            });
        }
        Ok(order)
    }

    /// Synthesize into a [`Manifest`]
    pub fn manifest(&self) -> Result<Manifest> {
        let mut manifest = Manifest::new(self.name());
        manifest.region = self.region.clone();
        manifest.account = self.account.clone();
        self.synthesize(&mut manifest)?;
        Ok(manifest)
    }
}

fn push_unique(list: &mut Vec<ResourceRef>, resource: ResourceRef) {
    if !list.contains(&resource) {
        list.push(resource);
    }
}

fn unknown(resource: ResourceRef) -> ConstructError {
    ConstructError::UnknownResource(format!("#{} ({})", resource.index(), resource.kind()))
}

fn immutable(node: &ResourceNode, option: &str) -> ConstructError {
    ConstructError::ImmutableOption {
        node: node.path.to_string(),
        option: option.to_string(),
    }
}

fn expect_shape(node: &ResourceNode, option: &str, shape: OptionShape) -> Result<()> {
    match option_spec(node.kind, option) {
        Some(spec) if spec.shape == shape => Ok(()),
        Some(_) => Err(immutable(node, option)),
        None => match recognized_elsewhere(node.kind, option) {
            Some(recognized_by) => Err(ConstructError::UnsupportedOption {
                node: node.path.to_string(),
                kind: node.kind,
                option: option.to_string(),
                recognized_by,
            }),
            None => Err(ConstructError::InvalidOption {
                node: node.path.to_string(),
                option: option.to_string(),
                reason: "additive calls only apply to recognized options".to_string(),
            }),
        },
    }
}
