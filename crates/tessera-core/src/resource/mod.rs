//! Resource nodes
//!
//! A [`ResourceNode`] is one declared primitive. It is built in a single
//! call from a [`ResourceSpec`]; afterwards only additive changes are
//! accepted (see `Stack::append_option`).

mod kind;
mod options;

pub use kind::ResourceKind;
pub use options::{
    DefaultValue, OptionShape, OptionSpec, option_spec, option_specs, recognized_elsewhere,
};

use crate::error::{ConstructError, Result};
use crate::naming;
use crate::tree::{ConstructId, ConstructPath};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub type OptionMap = BTreeMap<String, Value>;

/// Handle to a resource node owned by a `Stack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    index: usize,
    kind: ResourceKind,
}

impl ResourceRef {
    pub(crate) fn new(index: usize, kind: ResourceKind) -> Self {
        Self { index, kind }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// Everything needed to create one resource node
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub overrides: OptionMap,
    pub references: Vec<(String, ResourceRef)>,
    pub depends_on: Vec<ResourceRef>,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            overrides: OptionMap::new(),
            references: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Override one option
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Override one option when a value is present
    pub fn maybe_option<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.option(name, value),
            None => self,
        }
    }

    /// Merge a batch of overrides (typically a props struct's passthrough map)
    pub fn options(mut self, overrides: OptionMap) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Point `name` at another node and depend on it
    pub fn reference(mut self, name: impl Into<String>, target: ResourceRef) -> Self {
        self.references.push((name.into(), target));
        self
    }

    pub fn maybe_reference(self, name: impl Into<String>, target: Option<ResourceRef>) -> Self {
        match target {
            Some(target) => self.reference(name, target),
            None => self,
        }
    }

    pub fn depends_on(mut self, target: ResourceRef) -> Self {
        self.depends_on.push(target);
        self
    }
}

/// A declared resource with fully resolved options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub path: ConstructPath,
    #[serde(skip)]
    pub(crate) construct: Option<ConstructId>,
    #[serde(skip)]
    pub(crate) owner: Option<ConstructId>,
    /// Physical name, user-supplied or generated
    pub name: String,
    pub options: OptionMap,
    /// Options this library does not know, forwarded verbatim
    pub passthrough: OptionMap,
    pub depends_on: Vec<ResourceRef>,
    pub tags: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
}

impl ResourceNode {
    /// Resolve `spec` against the default table. `references` must already be
    /// folded into `spec.overrides` by the caller.
    pub(crate) fn resolve(path: ConstructPath, spec: &ResourceSpec) -> Result<Self> {
        let kind = spec.kind;
        let mut options = OptionMap::new();
        let mut passthrough = OptionMap::new();

        for option in option_specs(kind) {
            if let Some(value) = option.default.to_value()? {
                options.insert(option.name.to_string(), value);
            }
        }

        for (name, value) in &spec.overrides {
            match option_spec(kind, name) {
                Some(option) => {
                    check_shape(&path, option, value)?;
                    options.insert(name.clone(), value.clone());
                }
                None => {
                    if let Some(recognized_by) = recognized_elsewhere(kind, name) {
                        return Err(ConstructError::UnsupportedOption {
                            node: path.to_string(),
                            kind,
                            option: name.clone(),
                            recognized_by,
                        });
                    }
                    tracing::warn!(
                        "Passing unrecognized option '{}' of {} through to the provider",
                        name,
                        path
                    );
                    passthrough.insert(name.clone(), value.clone());
                }
            }
        }

        let name = kind
            .name_option()
            .and_then(|option| options.get(option))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| naming::generate_name(&path));

        let mut outputs = BTreeMap::new();
        outputs.insert("name".to_string(), name.clone());
        outputs.insert("arn".to_string(), format!("arn:tessera:{}:::{}", kind, name));
        for attribute in kind.output_attributes() {
            outputs.insert(attribute.to_string(), naming::attribute_token(&path, attribute));
        }

        Ok(Self {
            kind,
            path,
            construct: None,
            owner: None,
            name,
            options,
            passthrough,
            depends_on: Vec::new(),
            tags: BTreeMap::new(),
            outputs,
        })
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    pub fn arn(&self) -> &str {
        self.output("arn").unwrap_or_default()
    }

    /// Value stored in options that point at this node
    pub fn reference_value(&self) -> Value {
        json!({ "ref": self.path.to_string() })
    }
}

fn check_shape(path: &ConstructPath, option: &OptionSpec, value: &Value) -> Result<()> {
    let ok = match option.shape {
        OptionShape::Scalar => true,
        OptionShape::List => value.is_array(),
        OptionShape::Map => value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(ConstructError::InvalidOption {
            node: path.to_string(),
            option: option.name.to_string(),
            reason: format!("expected a {:?} value", option.shape).to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ConstructPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_unsupplied_options_take_defaults() {
        for kind in ResourceKind::ALL {
            let node = ResourceNode::resolve(path("S/N"), &ResourceSpec::new(kind)).unwrap();
            for option in option_specs(kind) {
                assert_eq!(
                    node.option(option.name).cloned(),
                    option.default.to_value().unwrap(),
                    "{}.{}",
                    kind,
                    option.name
                );
            }
        }
    }

    #[test]
    fn test_scalar_override_replaces_exactly() {
        let spec = ResourceSpec::new(ResourceKind::Network)
            .option("cidr", "172.16.0.0/16")
            .option("max_azs", 3);
        let node = ResourceNode::resolve(path("S/Net"), &spec).unwrap();

        assert_eq!(node.option("cidr"), Some(&json!("172.16.0.0/16")));
        assert_eq!(node.option("max_azs"), Some(&json!(3)));
        assert_eq!(node.option("nat_gateways"), Some(&json!(1)));
    }

    #[test]
    fn test_structured_override_is_not_merged() {
        let spec = ResourceSpec::new(ResourceKind::UsagePlan)
            .option("throttle", json!({ "rate_limit": 50 }));
        let node = ResourceNode::resolve(path("S/Plan"), &spec).unwrap();
        assert_eq!(node.option("throttle"), Some(&json!({ "rate_limit": 50 })));
    }

    #[test]
    fn test_option_of_other_kind_is_rejected() {
        let spec = ResourceSpec::new(ResourceKind::Table).option("versioned", true);
        let err = ResourceNode::resolve(path("S/T"), &spec).unwrap_err();
        assert!(matches!(
            err,
            ConstructError::UnsupportedOption {
                kind: ResourceKind::Table,
                recognized_by: ResourceKind::StorageBucket,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_option_passes_through() {
        let spec = ResourceSpec::new(ResourceKind::StorageBucket).option("object_lock", true);
        let node = ResourceNode::resolve(path("S/B"), &spec).unwrap();
        assert_eq!(node.passthrough.get("object_lock"), Some(&json!(true)));
        assert!(node.option("object_lock").is_none());
    }

    #[test]
    fn test_list_option_shape_checked() {
        let spec = ResourceSpec::new(ResourceKind::StorageBucket).option("lifecycle_rules", "none");
        assert!(matches!(
            ResourceNode::resolve(path("S/B"), &spec),
            Err(ConstructError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_supplied_name_and_outputs() {
        let spec = ResourceSpec::new(ResourceKind::Table).option("table_name", "orders");
        let node = ResourceNode::resolve(path("S/Orders/Table"), &spec).unwrap();
        assert_eq!(node.name, "orders");
        assert_eq!(node.arn(), "arn:tessera:table:::orders");
        assert_eq!(node.output("stream_arn"), Some("${S/Orders/Table.stream_arn}"));
    }

    #[test]
    fn test_generated_name_when_not_supplied() {
        let node =
            ResourceNode::resolve(
                path("S/Site/Bucket"),
                &ResourceSpec::new(ResourceKind::StorageBucket),
            )
                .unwrap();
        assert!(node.name.starts_with("s-site-bucket-"));
    }
}
