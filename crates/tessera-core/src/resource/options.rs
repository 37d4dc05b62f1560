//! Recognized options and documented defaults per resource kind
//!
//! Defaults are resolved once, when a node is created. A node never reads
//! this table again afterwards.

use super::ResourceKind;
use crate::error::Result;
use serde_json::Value;

/// How an option may grow after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionShape {
    /// Fixed at creation
    Scalar,
    /// Entries may be appended
    List,
    /// Keys may be inserted, never replaced
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// Unset unless supplied
    None,
    Bool(bool),
    Int(i64),
    Str(&'static str),
    /// Structured default, stored as JSON text
    Json(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Result<Option<Value>> {
        Ok(match self {
            DefaultValue::None => None,
            DefaultValue::Bool(b) => Some(Value::Bool(b)),
            DefaultValue::Int(i) => Some(Value::from(i)),
            DefaultValue::Str(s) => Some(Value::String(s.to_string())),
            DefaultValue::Json(text) => Some(serde_json::from_str(text)?),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub shape: OptionShape,
    pub default: DefaultValue,
}

const fn scalar(name: &'static str, default: DefaultValue) -> OptionSpec {
    OptionSpec {
        name,
        shape: OptionShape::Scalar,
        default,
    }
}

const fn list(name: &'static str, default: DefaultValue) -> OptionSpec {
    OptionSpec {
        name,
        shape: OptionShape::List,
        default,
    }
}

const fn map(name: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        shape: OptionShape::Map,
        default: DefaultValue::Json("{}"),
    }
}

use self::DefaultValue::{Bool, Int, Json, None as Unset, Str};

const COMPUTE_INSTANCE: &[OptionSpec] = &[
    scalar("instance_name", Unset),
    scalar("instance_type", Str("t3.micro")),
    scalar("machine_image", Str("latest-standard-linux")),
    scalar("subnet_placement", Str("private-with-egress")),
    scalar("management_agent", Bool(true)),
    scalar("key_name", Unset),
    scalar("user_data", Unset),
    scalar("network", Unset),
    scalar("security_group", Unset),
    scalar("role", Unset),
];

const STORAGE_BUCKET: &[OptionSpec] = &[
    scalar("bucket_name", Unset),
    scalar("encryption", Str("managed")),
    scalar("encryption_key", Unset),
    scalar("versioned", Bool(true)),
    scalar("public_access", Str("block-all")),
    scalar("enforce_ssl", Bool(true)),
    scalar("removal_policy", Str("retain")),
    scalar("auto_delete_objects", Bool(false)),
    list(
        "lifecycle_rules",
        Json(r#"[{"transitions":[{"storage_class":"infrequent-access","transition_after_days":90}]}]"#),
    ),
    scalar("server_access_logs_bucket", Unset),
];

const TABLE: &[OptionSpec] = &[
    scalar("table_name", Unset),
    scalar("partition_key", Unset),
    scalar("sort_key", Unset),
    scalar("billing_mode", Str("on-demand")),
    scalar("read_capacity", Unset),
    scalar("write_capacity", Unset),
    scalar("point_in_time_recovery", Bool(true)),
    scalar("removal_policy", Str("retain")),
    scalar("stream", Unset),
    scalar("time_to_live_attribute", Unset),
    list("global_secondary_indexes", Json("[]")),
];

const NETWORK: &[OptionSpec] = &[
    scalar("cidr", Str("10.0.0.0/16")),
    scalar("max_azs", Int(2)),
    scalar("nat_gateways", Int(1)),
    scalar(
        "subnet_configuration",
        Json(
            r#"[{"name":"Public","subnet_type":"public","cidr_mask":24},{"name":"Private","subnet_type":"private-with-egress","cidr_mask":24},{"name":"Isolated","subnet_type":"isolated","cidr_mask":24}]"#,
        ),
    ),
    scalar("enable_flow_logs", Bool(true)),
];

const SECURITY_RULE_GROUP: &[OptionSpec] = &[
    scalar("group_name", Unset),
    scalar("network", Unset),
    scalar("description", Unset),
    scalar("allow_all_outbound", Bool(true)),
    list("ingress_rules", Json("[]")),
];

const FUNCTION: &[OptionSpec] = &[
    scalar("function_name", Unset),
    scalar("code_path", Unset),
    scalar("handler", Str("index.handler")),
    scalar("runtime", Str("python3.9")),
    scalar("memory_size", Int(128)),
    scalar("timeout_seconds", Int(30)),
    map("environment"),
    scalar("log_retention_days", Int(7)),
    scalar("description", Str("Function managed by tessera")),
];

const API: &[OptionSpec] = &[
    scalar("rest_api_name", Unset),
    scalar("description", Unset),
    scalar("handler", Unset),
    scalar("proxy", Bool(true)),
    scalar("cors", Json(r#"{"allow_origins":["*"],"allow_methods":["*"]}"#)),
    scalar("api_key_required", Bool(false)),
    scalar("stage_name", Str("prod")),
];

const DISTRIBUTION: &[OptionSpec] = &[
    scalar("origin", Unset),
    scalar("viewer_protocol_policy", Str("redirect-to-https")),
    scalar("cache_policy", Str("caching-optimized")),
    scalar("default_root_object", Str("index.html")),
    list("error_responses", Json("[]")),
    scalar("certificate", Unset),
    list("domain_names", Json("[]")),
];

const DNS_RECORD: &[OptionSpec] = &[
    scalar("zone", Unset),
    scalar("record_name", Unset),
    scalar("record_type", Str("A")),
    scalar("target", Unset),
];

const CERTIFICATE: &[OptionSpec] = &[
    scalar("domain_name", Unset),
    scalar("validation_method", Str("dns")),
    scalar("hosted_zone", Unset),
];

const FLOW_LOG: &[OptionSpec] = &[
    scalar("network", Unset),
    scalar("traffic_type", Str("all")),
    scalar("destination", Str("log-group")),
];

const NETWORK_ENDPOINT: &[OptionSpec] = &[
    scalar("network", Unset),
    scalar("endpoint_type", Str("interface")),
    scalar("service", Unset),
    scalar("subnets", Unset),
];

const ROLE: &[OptionSpec] = &[
    scalar("role_name", Unset),
    scalar("assumed_by", Unset),
    list("managed_policies", Json("[]")),
];

const USAGE_PLAN: &[OptionSpec] = &[
    scalar("plan_name", Unset),
    scalar("throttle", Json(r#"{"rate_limit":10,"burst_limit":20}"#)),
    list("api_stages", Json("[]")),
    list("api_keys", Json("[]")),
];

const API_KEY: &[OptionSpec] = &[
    scalar("api_key_name", Unset),
    scalar("enabled", Bool(true)),
];

const BUCKET_DEPLOYMENT: &[OptionSpec] = &[
    list("sources", Json("[]")),
    scalar("destination_bucket", Unset),
    scalar("distribution", Unset),
    list("distribution_paths", Json(r#"["/*"]"#)),
];

/// Recognized options of `kind`
pub fn option_specs(kind: ResourceKind) -> &'static [OptionSpec] {
    match kind {
        ResourceKind::ComputeInstance => COMPUTE_INSTANCE,
        ResourceKind::StorageBucket => STORAGE_BUCKET,
        ResourceKind::Table => TABLE,
        ResourceKind::Network => NETWORK,
        ResourceKind::SecurityRuleGroup => SECURITY_RULE_GROUP,
        ResourceKind::Function => FUNCTION,
        ResourceKind::Api => API,
        ResourceKind::Distribution => DISTRIBUTION,
        ResourceKind::DnsRecord => DNS_RECORD,
        ResourceKind::Certificate => CERTIFICATE,
        ResourceKind::FlowLog => FLOW_LOG,
        ResourceKind::NetworkEndpoint => NETWORK_ENDPOINT,
        ResourceKind::Role => ROLE,
        ResourceKind::UsagePlan => USAGE_PLAN,
        ResourceKind::ApiKey => API_KEY,
        ResourceKind::BucketDeployment => BUCKET_DEPLOYMENT,
    }
}

pub fn option_spec(kind: ResourceKind, name: &str) -> Option<&'static OptionSpec> {
    option_specs(kind).iter().find(|spec| spec.name == name)
}

/// First other kind that recognizes `name`, if any
pub fn recognized_elsewhere(kind: ResourceKind, name: &str) -> Option<ResourceKind> {
    ResourceKind::ALL
        .into_iter()
        .filter(|other| *other != kind)
        .find(|other| option_spec(*other, name).is_some())
}
