use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource kinds the factory knows defaults for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ComputeInstance,
    StorageBucket,
    Table,
    Network,
    SecurityRuleGroup,
    Function,
    Api,
    Distribution,
    DnsRecord,
    Certificate,
    FlowLog,
    NetworkEndpoint,
    Role,
    UsagePlan,
    ApiKey,
    BucketDeployment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 16] = [
        ResourceKind::ComputeInstance,
        ResourceKind::StorageBucket,
        ResourceKind::Table,
        ResourceKind::Network,
        ResourceKind::SecurityRuleGroup,
        ResourceKind::Function,
        ResourceKind::Api,
        ResourceKind::Distribution,
        ResourceKind::DnsRecord,
        ResourceKind::Certificate,
        ResourceKind::FlowLog,
        ResourceKind::NetworkEndpoint,
        ResourceKind::Role,
        ResourceKind::UsagePlan,
        ResourceKind::ApiKey,
        ResourceKind::BucketDeployment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::StorageBucket => "storage-bucket",
            ResourceKind::Table => "table",
            ResourceKind::Network => "network",
            ResourceKind::SecurityRuleGroup => "security-rule-group",
            ResourceKind::Function => "function",
            ResourceKind::Api => "api",
            ResourceKind::Distribution => "distribution",
            ResourceKind::DnsRecord => "dns-record",
            ResourceKind::Certificate => "certificate",
            ResourceKind::FlowLog => "flow-log",
            ResourceKind::NetworkEndpoint => "network-endpoint",
            ResourceKind::Role => "role",
            ResourceKind::UsagePlan => "usage-plan",
            ResourceKind::ApiKey => "api-key",
            ResourceKind::BucketDeployment => "bucket-deployment",
        }
    }

    /// Option holding the user-supplied physical name, if the kind has one
    pub fn name_option(&self) -> Option<&'static str> {
        match self {
            ResourceKind::ComputeInstance => Some("instance_name"),
            ResourceKind::StorageBucket => Some("bucket_name"),
            ResourceKind::Table => Some("table_name"),
            ResourceKind::Function => Some("function_name"),
            ResourceKind::Api => Some("rest_api_name"),
            ResourceKind::Role => Some("role_name"),
            ResourceKind::UsagePlan => Some("plan_name"),
            ResourceKind::SecurityRuleGroup => Some("group_name"),
            _ => None,
        }
    }

    /// Deploy-time attributes exposed as outputs besides `name` and `arn`
    pub fn output_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ComputeInstance => &["id", "private_ip"],
            ResourceKind::StorageBucket => &["domain_name"],
            ResourceKind::Table => &["stream_arn"],
            ResourceKind::Network => &["id", "cidr_block"],
            ResourceKind::SecurityRuleGroup => &["id"],
            ResourceKind::Function => &[],
            ResourceKind::Api => &["id", "url"],
            ResourceKind::Distribution => &["id", "domain_name"],
            ResourceKind::DnsRecord => &["fqdn"],
            ResourceKind::Certificate => &[],
            ResourceKind::FlowLog => &["id"],
            ResourceKind::NetworkEndpoint => &["id"],
            ResourceKind::Role => &[],
            ResourceKind::UsagePlan => &["id"],
            ResourceKind::ApiKey => &["id"],
            ResourceKind::BucketDeployment => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
