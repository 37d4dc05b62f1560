mod common;

use anyhow::Result;
use serde_json::json;
use tessera_constructs::rules::ingress_rules;
use tessera_constructs::{
    CommonSecurityGroups, IngressRule, NetworkProps, Peer, Port, StandardNetwork,
};
use tessera_core::{ConstructError, Stack};

#[test]
fn test_management_access_adds_exactly_two_rules() -> Result<()> {
    common::init_tracing();

    let mut stack = Stack::new("Infra")?;
    let root = stack.root();
    let network = StandardNetwork::new(&mut stack, root, "Network", NetworkProps::default())?;
    let groups = CommonSecurityGroups::new(&mut stack, root, "SecurityGroups", network.vpc()?)?;

    groups.allow_management_access_from(&mut stack, "198.51.100.7/32")?;

    let rules = ingress_rules(&stack, groups.management())?;
    assert_eq!(
        rules,
        vec![
            json!({
                "peer": { "cidr": "198.51.100.7/32" },
                "protocol": "tcp",
                "from_port": 22,
                "to_port": 22,
                "description": "Allow SSH from 198.51.100.7/32",
            }),
            json!({
                "peer": { "cidr": "198.51.100.7/32" },
                "protocol": "tcp",
                "from_port": 3389,
                "to_port": 3389,
                "description": "Allow RDP from 198.51.100.7/32",
            }),
        ]
    );

    // Other groups are untouched
    assert_eq!(ingress_rules(&stack, groups.web())?.len(), 2);
    Ok(())
}

#[test]
fn test_groups_depend_on_network_and_web_group() -> Result<()> {
    common::init_tracing();

    let mut stack = Stack::new("Infra")?;
    let root = stack.root();
    let network = StandardNetwork::new(&mut stack, root, "Network", NetworkProps::default())?;
    let vpc = network.vpc()?;
    let groups = CommonSecurityGroups::new(&mut stack, root, "SecurityGroups", vpc)?;

    let database = stack.resource(groups.database())?;
    assert_eq!(database.depends_on, vec![vpc, groups.web()]);

    let manifest = stack.manifest()?;
    let position = |path: &str| manifest.resources.iter().position(|r| r.path == path);
    assert!(position("Infra/Network/VPC") < position("Infra/SecurityGroups/WebServerSG"));
    assert!(
        position("Infra/SecurityGroups/WebServerSG") < position("Infra/SecurityGroups/DatabaseSG")
    );
    Ok(())
}

#[test]
fn test_rule_from_later_group_is_declared_after_it() -> Result<()> {
    common::init_tracing();

    let mut stack = Stack::new("Infra")?;
    let root = stack.root();
    let network = StandardNetwork::new(&mut stack, root, "Network", NetworkProps::default())?;
    let groups = CommonSecurityGroups::new(&mut stack, root, "SecurityGroups", network.vpc()?)?;

    // The web group was created before the management group.
    let rule = IngressRule::new(Peer::Group(groups.management()), Port::tcp(8443));
    groups.add_ingress_rule(&mut stack, groups.web(), &rule)?;

    let manifest = stack.manifest()?;
    for (position, resource) in manifest.resources.iter().enumerate() {
        for dependency in &resource.depends_on {
            let declared_at = manifest
                .resources
                .iter()
                .position(|r| &r.path == dependency)
                .expect("dependency declared");
            assert!(declared_at < position, "{} declared after {}", dependency, resource.path);
        }
    }

    // The management group already feeds the web group; the reverse would loop.
    let reverse = IngressRule::new(Peer::Group(groups.web()), Port::tcp(22));
    assert!(matches!(
        groups.add_ingress_rule(&mut stack, groups.management(), &reverse),
        Err(ConstructError::DependencyCycle { .. })
    ));
    assert!(ingress_rules(&stack, groups.management())?.is_empty());
    Ok(())
}
