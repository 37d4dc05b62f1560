//! Standard compute instance
//!
//! Creates its own security group and role unless the caller supplies them.

use crate::network::SubnetType;
use crate::rules::{IngressRule, Peer, Port, add_ingress_rule};
use serde_json::Value;
use tessera_core::{
    Composite, Construct, ConstructError, ConstructId, ConstructState, OptionMap, ResourceKind,
    ResourceRef, ResourceSpec, Result, Stack,
};

/// Principal allowed to assume the generated instance role
pub const INSTANCE_PRINCIPAL: &str = "ec2.amazonaws.com";
/// Managed policy for the management agent
pub const MANAGEMENT_AGENT_POLICY: &str = "AmazonSSMManagedInstanceCore";

#[derive(Debug, Clone)]
pub struct InstanceProps {
    pub network: ResourceRef,
    pub instance_name: Option<String>,
    pub instance_type: Option<String>,
    pub machine_image: Option<String>,
    pub subnet_placement: Option<SubnetType>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    pub management_agent: Option<bool>,
    pub security_group: Option<ResourceRef>,
    pub role: Option<ResourceRef>,
    pub extra: OptionMap,
}

impl InstanceProps {
    pub fn new(network: ResourceRef) -> Self {
        Self {
            network,
            instance_name: None,
            instance_type: None,
            machine_image: None,
            subnet_placement: None,
            key_name: None,
            user_data: None,
            management_agent: None,
            security_group: None,
            role: None,
            extra: OptionMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StandardInstance {
    composite: Composite,
    instance: ResourceRef,
    security_group: ResourceRef,
    role: ResourceRef,
}

impl StandardInstance {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: InstanceProps,
    ) -> Result<Self> {
        let base = stack.path(parent).child(id);
        expect_kind(
            &base.child("Instance").to_string(),
            "network",
            props.network,
            ResourceKind::Network,
        )?;
        if let Some(group) = props.security_group {
            expect_kind(
                &base.to_string(),
                "security_group",
                group,
                ResourceKind::SecurityRuleGroup,
            )?;
        }
        if let Some(role) = props.role {
            expect_kind(&base.to_string(), "role", role, ResourceKind::Role)?;
        }

        let mut composite = Composite::declare(stack, parent, id, "instance")?;

        let security_group = match props.security_group {
            Some(group) => group,
            None => {
                let group = composite.create(
                    stack,
                    "SecurityGroup",
                    ResourceSpec::new(ResourceKind::SecurityRuleGroup)
                        .reference("network", props.network)
                        .option("description", format!("Security group for {}", id)),
                )?;
                if props.key_name.is_some() {
                    let ssh = IngressRule::new(Peer::AnyIpv4, Port::tcp(22))
                        .described("Allow SSH access");
                    add_ingress_rule(stack, group, &ssh)?;
                }
                group
            }
        };

        let management_agent = props.management_agent.unwrap_or(true);
        let role = match props.role {
            Some(role) => role,
            None => {
                let policies: Vec<&str> = if management_agent {
                    vec![MANAGEMENT_AGENT_POLICY]
                } else {
                    Vec::new()
                };
                composite.create(
                    stack,
                    "InstanceRole",
                    ResourceSpec::new(ResourceKind::Role)
                        .option("assumed_by", INSTANCE_PRINCIPAL)
                        .option("managed_policies", policies),
                )?
            }
        };

        let placement = props.subnet_placement.map(serde_json::to_value).transpose()?;
        let spec = ResourceSpec::new(ResourceKind::ComputeInstance)
            .maybe_option("instance_name", props.instance_name)
            .maybe_option("instance_type", props.instance_type)
            .maybe_option("machine_image", props.machine_image)
            .maybe_option("subnet_placement", placement)
            .maybe_option("key_name", props.key_name)
            .maybe_option("user_data", props.user_data)
            .option("management_agent", management_agent)
            .reference("network", props.network)
            .reference("security_group", security_group)
            .reference("role", role)
            .options(props.extra);

        let instance = composite.create(stack, "Instance", spec)?;
        stack.tag(instance, "Name", id)?;
        composite.advance(ConstructState::BaseCreated)?;

        composite.expose_resource("instance", instance);
        composite.expose_resource("security_group", security_group);
        composite.expose_resource("role", role);
        composite.finish()?;

        Ok(Self {
            composite,
            instance,
            security_group,
            role,
        })
    }

    pub fn instance(&self) -> Result<ResourceRef> {
        self.composite.resource_output("instance")
    }

    pub fn security_group(&self) -> Result<ResourceRef> {
        self.composite.resource_output("security_group")
    }

    pub fn role(&self) -> Result<ResourceRef> {
        self.composite.resource_output("role")
    }

    pub fn add_security_group_rule(&self, stack: &mut Stack, rule: &IngressRule) -> Result<()> {
        self.composite.require_ready()?;
        add_ingress_rule(stack, self.security_group, rule)
    }

    /// Attach another managed policy to the instance role
    pub fn add_managed_policy(&self, stack: &mut Stack, policy: &str) -> Result<()> {
        self.composite.require_ready()?;
        let node = stack.resource(self.role)?;
        let present = node
            .option("managed_policies")
            .and_then(Value::as_array)
            .is_some_and(|p| p.iter().any(|v| v.as_str() == Some(policy)));
        if present {
            return Ok(());
        }
        stack.append_option(self.role, "managed_policies", Value::String(policy.to_string()))
    }
}

fn expect_kind(
    node: &str,
    option: &str,
    resource: ResourceRef,
    expected: ResourceKind,
) -> Result<()> {
    if resource.kind() == expected {
        Ok(())
    } else {
        Err(ConstructError::InvalidOption {
            node: node.to_string(),
            option: option.to_string(),
            reason: format!("expected a {}, got {}", expected, resource.kind()),
        })
    }
}

impl Construct for StandardInstance {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkProps, StandardNetwork};
    use crate::rules::ingress_rules;
    use serde_json::json;
    use tessera_core::{MANAGED_BY_TAG, MANAGED_BY_VALUE};

    fn network(stack: &mut Stack) -> ResourceRef {
        let root = stack.root();
        StandardNetwork::new(stack, root, "Net", NetworkProps::default())
            .unwrap()
            .vpc()
            .unwrap()
    }

    #[test]
    fn test_creates_group_and_role() {
        let mut stack = Stack::new("S").unwrap();
        let vpc = network(&mut stack);
        let root = stack.root();
        let instance =
            StandardInstance::new(&mut stack, root, "Bastion", InstanceProps::new(vpc)).unwrap();

        let node = stack.resource(instance.instance().unwrap()).unwrap();
        assert_eq!(node.option("instance_type"), Some(&json!("t3.micro")));
        assert_eq!(node.option("subnet_placement"), Some(&json!("private-with-egress")));
        assert_eq!(
            node.option("security_group"),
            Some(&json!({ "ref": "S/Bastion/SecurityGroup" }))
        );
        assert_eq!(node.tags[MANAGED_BY_TAG], MANAGED_BY_VALUE);
        assert_eq!(node.tags["Name"], "Bastion");

        // No key pair, no SSH
        assert!(ingress_rules(&stack, instance.security_group().unwrap()).unwrap().is_empty());

        let role = stack.resource(instance.role().unwrap()).unwrap();
        assert_eq!(role.option("assumed_by"), Some(&json!(INSTANCE_PRINCIPAL)));
        assert_eq!(role.option("managed_policies"), Some(&json!([MANAGEMENT_AGENT_POLICY])));
    }

    #[test]
    fn test_key_name_opens_ssh() {
        let mut stack = Stack::new("S").unwrap();
        let vpc = network(&mut stack);
        let root = stack.root();
        let mut props = InstanceProps::new(vpc);
        props.key_name = Some("ops".to_string());
        let instance = StandardInstance::new(&mut stack, root, "Bastion", props).unwrap();

        let rules = ingress_rules(&stack, instance.security_group().unwrap()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["from_port"], json!(22));
        assert_eq!(rules[0]["peer"]["cidr"], json!("0.0.0.0/0"));
    }

    #[test]
    fn test_supplied_group_is_used() {
        let mut stack = Stack::new("S").unwrap();
        let vpc = network(&mut stack);
        let root = stack.root();
        let group = stack
            .create(root, "Shared", ResourceSpec::new(ResourceKind::SecurityRuleGroup))
            .unwrap();
        let mut props = InstanceProps::new(vpc);
        props.security_group = Some(group);
        let instance = StandardInstance::new(&mut stack, root, "App", props).unwrap();

        assert_eq!(instance.security_group().unwrap(), group);
        assert!(stack.find_resource(&"S/App/SecurityGroup".parse().unwrap()).is_none());

        instance
            .add_security_group_rule(
                &mut stack,
                &IngressRule::new(Peer::ipv4("10.0.0.0/16"), Port::tcp(8080)),
            )
            .unwrap();
        assert_eq!(ingress_rules(&stack, group).unwrap().len(), 1);
    }

    #[test]
    fn test_requires_network() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let role = stack.create(root, "Role", ResourceSpec::new(ResourceKind::Role)).unwrap();
        assert!(matches!(
            StandardInstance::new(&mut stack, root, "App", InstanceProps::new(role)),
            Err(ConstructError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_managed_policy_added_once() {
        let mut stack = Stack::new("S").unwrap();
        let vpc = network(&mut stack);
        let root = stack.root();
        let instance =
            StandardInstance::new(&mut stack, root, "App", InstanceProps::new(vpc)).unwrap();
        instance.add_managed_policy(&mut stack, "ReadOnlyAccess").unwrap();
        instance.add_managed_policy(&mut stack, "ReadOnlyAccess").unwrap();

        let role = stack.resource(instance.role().unwrap()).unwrap();
        assert_eq!(
            role.option("managed_policies"),
            Some(&json!([MANAGEMENT_AGENT_POLICY, "ReadOnlyAccess"]))
        );
    }
}
