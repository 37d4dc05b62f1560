//! Ingress rules for security rule groups

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::Ipv4Addr;
use tessera_core::{ConstructError, ResourceKind, ResourceRef, Result, Stack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    All,
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub from: u16,
    pub to: u16,
}

impl Port {
    pub fn tcp(port: u16) -> Self {
        Self::tcp_range(port, port)
    }

    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from,
            to,
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            from: port,
            to: port,
        }
    }
}

/// Traffic source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    AnyIpv4,
    Ipv4(String),
    Group(ResourceRef),
}

impl Peer {
    pub fn ipv4(cidr: impl Into<String>) -> Self {
        Peer::Ipv4(cidr.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: Port,
    pub description: Option<String>,
}

impl IngressRule {
    pub fn new(peer: Peer, port: Port) -> Self {
        Self {
            peer,
            port,
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_value(&self, stack: &Stack, group_path: &str) -> Result<Value> {
        let peer = match &self.peer {
            Peer::AnyIpv4 => json!({ "cidr": "0.0.0.0/0" }),
            Peer::Ipv4(cidr) => {
                if !is_ipv4_cidr(cidr) {
                    return Err(ConstructError::InvalidOption {
                        node: group_path.to_string(),
                        option: "ingress_rules".to_string(),
                        reason: format!("'{}' is not an IPv4 CIDR", cidr),
                    });
                }
                json!({ "cidr": cidr })
            }
            Peer::Group(group) => json!({ "group": stack.reference(*group)? }),
        };

        let mut rule = json!({
            "peer": peer,
            "protocol": self.port.protocol,
            "from_port": self.port.from,
            "to_port": self.port.to,
        });
        if let Some(description) = &self.description {
            rule["description"] = Value::String(description.clone());
        }
        Ok(rule)
    }
}

/// Append `rule` to `group`'s ingress rules
pub fn add_ingress_rule(stack: &mut Stack, group: ResourceRef, rule: &IngressRule) -> Result<()> {
    let group_path = stack.resource(group)?.path.to_string();
    if group.kind() != ResourceKind::SecurityRuleGroup {
        return Err(ConstructError::InvalidOption {
            node: group_path,
            option: "ingress_rules".to_string(),
            reason: format!("{} is not a security rule group", group.kind()),
        });
    }
    if rule.port.from > rule.port.to {
        return Err(ConstructError::InvalidOption {
            node: group_path,
            option: "ingress_rules".to_string(),
            reason: format!("port range {}-{} is reversed", rule.port.from, rule.port.to),
        });
    }

    // A rule whose source group would close a dependency cycle is not appended.
    let value = rule.to_value(stack, &group_path)?;
    if let Peer::Group(source) = rule.peer
        && source != group
    {
        stack.add_dependency(group, source)?;
    }
    stack.append_option(group, "ingress_rules", value)?;
    tracing::debug!(
        "Ingress {:?} {}-{} added to {}",
        rule.port.protocol,
        rule.port.from,
        rule.port.to,
        group_path
    );
    Ok(())
}

/// Ingress rules currently declared on `group`
pub fn ingress_rules(stack: &Stack, group: ResourceRef) -> Result<Vec<Value>> {
    Ok(stack
        .resource(group)?
        .option("ingress_rules")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

pub fn is_ipv4_cidr(value: &str) -> bool {
    let Some((address, prefix)) = value.split_once('/') else {
        return false;
    };
    address.parse::<Ipv4Addr>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
}
