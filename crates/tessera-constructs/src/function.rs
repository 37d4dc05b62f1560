//! Managed function
//!
//! There is no default handler code: a function without a code path is
//! rejected before anything is registered.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tessera_core::{
    Capability, Composite, Construct, ConstructError, ConstructId, ConstructState, GrantId,
    GrantRequest, OptionMap, Principal, ResourceKind, ResourceRef, ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone, Default)]
pub struct FunctionProps {
    pub function_name: Option<String>,
    pub code_path: Option<String>,
    pub handler: Option<String>,
    pub runtime: Option<String>,
    pub memory_size: Option<u32>,
    pub timeout_seconds: Option<u32>,
    pub environment: BTreeMap<String, String>,
    pub log_retention_days: Option<u32>,
    pub description: Option<String>,
    pub extra: OptionMap,
}

impl FunctionProps {
    pub fn new(code_path: impl Into<String>) -> Self {
        Self {
            code_path: Some(code_path.into()),
            ..Default::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ManagedFunction {
    composite: Composite,
    function: ResourceRef,
}

impl ManagedFunction {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: FunctionProps,
    ) -> Result<Self> {
        let Some(code_path) = props.code_path.filter(|p| !p.trim().is_empty()) else {
            return Err(ConstructError::MissingCodePath {
                construct: stack.path(parent).child(id).to_string(),
            });
        };

        let mut composite = Composite::declare(stack, parent, id, "function")?;

        let environment: Map<String, Value> = props
            .environment
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let spec = ResourceSpec::new(ResourceKind::Function)
            .maybe_option("function_name", props.function_name)
            .option("code_path", code_path)
            .maybe_option("handler", props.handler)
            .maybe_option("runtime", props.runtime)
            .maybe_option("memory_size", props.memory_size)
            .maybe_option("timeout_seconds", props.timeout_seconds)
            .option("environment", environment)
            .maybe_option("log_retention_days", props.log_retention_days)
            .maybe_option("description", props.description)
            .options(props.extra);

        let function = composite.create(stack, "Function", spec)?;
        composite.advance(ConstructState::BaseCreated)?;

        let node = stack.resource(function)?;
        let (name, arn) = (node.name.clone(), node.arn().to_string());
        composite.expose_resource("function", function);
        composite.expose_value("function_name", name);
        composite.expose_value("function_arn", arn);
        composite.finish()?;

        Ok(Self { composite, function })
    }

    pub fn function(&self) -> Result<ResourceRef> {
        self.composite.resource_output("function")
    }

    pub fn function_name(&self) -> Result<&str> {
        self.composite.value_output("function_name")
    }

    pub fn function_arn(&self) -> Result<&str> {
        self.composite.value_output("function_arn")
    }

    /// Add a new environment variable. Existing keys are never replaced.
    pub fn add_environment_variable(
        &self,
        stack: &mut Stack,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.composite.require_ready()?;
        let value = Value::String(value.to_string());
        stack.insert_option_entry(self.function, "environment", key, value)
    }

    pub fn grant_invoke(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.composite.require_ready()?;
        let request = GrantRequest::new(subject, self.function).allow(Capability::Invoke);
        self.composite.grant(stack, request)
    }
}

impl Construct for ManagedFunction {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_code_path() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();

        for props in [FunctionProps::default(), FunctionProps::new("  ")] {
            assert!(matches!(
                ManagedFunction::new(&mut stack, root, "Handler", props),
                Err(ConstructError::MissingCodePath { construct }) if construct == "S/Handler"
            ));
        }
        assert_eq!(stack.tree().len(), 1);
    }

    #[test]
    fn test_defaults_and_outputs() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = FunctionProps::new("./handler");
        let function = ManagedFunction::new(&mut stack, root, "Handler", props).unwrap();

        let node = stack.resource(function.function().unwrap()).unwrap();
        assert_eq!(node.option("runtime"), Some(&json!("python3.9")));
        assert_eq!(node.option("memory_size"), Some(&json!(128)));
        assert_eq!(node.option("timeout_seconds"), Some(&json!(30)));
        assert_eq!(node.option("log_retention_days"), Some(&json!(7)));
        assert_eq!(
            function.function_arn().unwrap(),
            format!("arn:tessera:function:::{}", node.name)
        );
    }

    #[test]
    fn test_environment_is_additive() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = FunctionProps::new("./handler").env("STAGE", "prod");
        let function = ManagedFunction::new(&mut stack, root, "Handler", props).unwrap();

        function.add_environment_variable(&mut stack, "LOG_LEVEL", "debug").unwrap();
        assert!(matches!(
            function.add_environment_variable(&mut stack, "STAGE", "dev"),
            Err(ConstructError::DuplicateEntry { .. })
        ));

        let node = stack.resource(function.function().unwrap()).unwrap();
        assert_eq!(
            node.option("environment"),
            Some(&json!({ "STAGE": "prod", "LOG_LEVEL": "debug" }))
        );
    }

    #[test]
    fn test_grant_invoke() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut function =
            ManagedFunction::new(&mut stack, root, "Handler", FunctionProps::new("./h")).unwrap();
        let api = stack.create(root, "Api", ResourceSpec::new(ResourceKind::Api)).unwrap();

        let grant = function.grant_invoke(&mut stack, api).unwrap();
        assert!(stack.grants().get(grant).unwrap().allows(Capability::Invoke));
        assert_eq!(function.composite().grants(), &[grant]);
    }
}
