//! Common security rule groups
//!
//! Four groups bound to one network:
//! - web: tcp 80 and 443 from anywhere
//! - database: tcp 3306 and 5432 from the web group
//! - application: tcp 8000-9000 from the web group
//! - management: nothing until `allow_management_access_from`

use crate::rules::{IngressRule, Peer, Port, add_ingress_rule, is_ipv4_cidr};
use tessera_core::{
    Composite, Construct, ConstructError, ConstructId, ConstructState, ResourceKind, ResourceRef,
    ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone)]
pub struct CommonSecurityGroups {
    composite: Composite,
    web: ResourceRef,
    database: ResourceRef,
    application: ResourceRef,
    management: ResourceRef,
}

impl CommonSecurityGroups {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        network: ResourceRef,
    ) -> Result<Self> {
        if network.kind() != ResourceKind::Network {
            return Err(ConstructError::InvalidOption {
                node: stack.path(parent).child(id).to_string(),
                option: "network".to_string(),
                reason: format!("expected a network, got {}", network.kind()),
            });
        }

        let mut composite = Composite::declare(stack, parent, id, "security-groups")?;
        let mut group = |stack: &mut Stack, id: &str, description: &str| {
            composite.create(
                stack,
                id,
                ResourceSpec::new(ResourceKind::SecurityRuleGroup)
                    .reference("network", network)
                    .option("description", description)
                    .option("allow_all_outbound", true),
            )
        };

        let web = group(stack, "WebServerSG", "Security group for web servers")?;
        let database = group(stack, "DatabaseSG", "Security group for databases")?;
        let application = group(stack, "AppServerSG", "Security group for application servers")?;
        let management = group(stack, "ManagementSG", "Security group for management access")?;
        composite.advance(ConstructState::BaseCreated)?;

        let rules = [
            (web, IngressRule::new(Peer::AnyIpv4, Port::tcp(80)).described("Allow HTTP traffic")),
            (web, IngressRule::new(Peer::AnyIpv4, Port::tcp(443)).described("Allow HTTPS traffic")),
            (
                database,
                IngressRule::new(Peer::Group(web), Port::tcp(3306))
                    .described("Allow MySQL traffic from web servers"),
            ),
            (
                database,
                IngressRule::new(Peer::Group(web), Port::tcp(5432))
                    .described("Allow PostgreSQL traffic from web servers"),
            ),
            (
                application,
                IngressRule::new(Peer::Group(web), Port::tcp_range(8000, 9000))
                    .described("Allow application traffic from web servers"),
            ),
        ];
        for (target, rule) in &rules {
            add_ingress_rule(stack, *target, rule)?;
        }

        composite.expose_resource("web", web);
        composite.expose_resource("database", database);
        composite.expose_resource("application", application);
        composite.expose_resource("management", management);
        composite.finish()?;

        Ok(Self {
            composite,
            web,
            database,
            application,
            management,
        })
    }

    pub fn web(&self) -> ResourceRef {
        self.web
    }

    pub fn database(&self) -> ResourceRef {
        self.database
    }

    pub fn application(&self) -> ResourceRef {
        self.application
    }

    pub fn management(&self) -> ResourceRef {
        self.management
    }

    /// Allow SSH (22) and RDP (3389) into the management group from `cidr`
    pub fn allow_management_access_from(&self, stack: &mut Stack, cidr: &str) -> Result<&Self> {
        // Both rules or neither.
        if !is_ipv4_cidr(cidr) {
            return Err(ConstructError::InvalidOption {
                node: stack.resource(self.management)?.path.to_string(),
                option: "ingress_rules".to_string(),
                reason: format!("'{}' is not an IPv4 CIDR", cidr),
            });
        }
        let ssh = IngressRule::new(Peer::ipv4(cidr), Port::tcp(22))
            .described(format!("Allow SSH from {}", cidr));
        let rdp = IngressRule::new(Peer::ipv4(cidr), Port::tcp(3389))
            .described(format!("Allow RDP from {}", cidr));
        add_ingress_rule(stack, self.management, &ssh)?;
        add_ingress_rule(stack, self.management, &rdp)?;
        tracing::info!("{}: management access allowed from {}", self.composite.path(), cidr);
        Ok(self)
    }

    /// Additive rule on one of the four groups
    pub fn add_ingress_rule(
        &self,
        stack: &mut Stack,
        group: ResourceRef,
        rule: &IngressRule,
    ) -> Result<()> {
        let owned = [self.web, self.database, self.application, self.management];
        if !owned.contains(&group) {
            return Err(ConstructError::UnknownResource(format!(
                "{} is not one of {}'s groups",
                stack.resource(group).map(|n| n.path.to_string()).unwrap_or_default(),
                self.composite.path()
            )));
        }
        add_ingress_rule(stack, group, rule)
    }
}

impl Construct for CommonSecurityGroups {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}
