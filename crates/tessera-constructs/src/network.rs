//! Standard network
//!
//! Lifecycle: `uninitialized -> base-created -> flow-logs-attached (if
//! enabled) -> ready`. Endpoints are added once the network is ready and do
//! not change its state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tessera_core::{
    Composite, Construct, ConstructId, ConstructState, OptionMap, ResourceKind, ResourceRef,
    ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetType {
    Public,
    PrivateWithEgress,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfiguration {
    pub name: String,
    pub subnet_type: SubnetType,
    pub cidr_mask: u8,
}

impl SubnetConfiguration {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            cidr_mask,
        }
    }
}

/// Services reachable through gateway endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayService {
    ObjectStorage,
    KeyValueTable,
}

impl GatewayService {
    fn service_name(&self) -> &'static str {
        match self {
            GatewayService::ObjectStorage => "s3",
            GatewayService::KeyValueTable => "dynamodb",
        }
    }
}

impl fmt::Display for GatewayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayService::ObjectStorage => write!(f, "S3"),
            GatewayService::KeyValueTable => write!(f, "DynamoDB"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkProps {
    pub cidr: Option<String>,
    pub max_azs: Option<u32>,
    pub nat_gateways: Option<u32>,
    pub enable_flow_logs: Option<bool>,
    pub subnet_configuration: Option<Vec<SubnetConfiguration>>,
    /// Provider-specific options forwarded as-is
    pub extra: OptionMap,
}

#[derive(Debug, Clone)]
pub struct StandardNetwork {
    composite: Composite,
    vpc: ResourceRef,
    flow_log: Option<ResourceRef>,
    endpoints: Vec<ResourceRef>,
}

impl StandardNetwork {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: NetworkProps,
    ) -> Result<Self> {
        let mut composite = Composite::declare(stack, parent, id, "network")?;

        let subnets = props
            .subnet_configuration
            .map(serde_json::to_value)
            .transpose()?;
        let spec = ResourceSpec::new(ResourceKind::Network)
            .maybe_option("cidr", props.cidr)
            .maybe_option("max_azs", props.max_azs)
            .maybe_option("nat_gateways", props.nat_gateways)
            .maybe_option("enable_flow_logs", props.enable_flow_logs)
            .maybe_option("subnet_configuration", subnets)
            .options(props.extra);

        let vpc = composite.create(stack, "VPC", spec)?;
        stack.tag(vpc, "Name", &format!("{}-vpc", id))?;
        composite.advance(ConstructState::BaseCreated)?;

        let flow_logs = stack
            .resource(vpc)?
            .option("enable_flow_logs")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let flow_log = if flow_logs {
            let log = composite.create(
                stack,
                "FlowLog",
                ResourceSpec::new(ResourceKind::FlowLog).reference("network", vpc),
            )?;
            composite.advance(ConstructState::FlowLogsAttached)?;
            Some(log)
        } else {
            None
        };

        composite.expose_resource("vpc", vpc);
        composite.finish()?;

        Ok(Self {
            composite,
            vpc,
            flow_log,
            endpoints: Vec::new(),
        })
    }

    pub fn vpc(&self) -> Result<ResourceRef> {
        self.composite.resource_output("vpc")
    }

    pub fn flow_log(&self) -> Option<ResourceRef> {
        self.flow_log
    }

    pub fn endpoints(&self) -> &[ResourceRef] {
        &self.endpoints
    }

    /// Interface endpoint for a dotted service name, e.g. `com.example.eu-west-1.ssm`
    pub fn add_interface_endpoint(
        &mut self,
        stack: &mut Stack,
        service_name: &str,
        subnets: Option<SubnetType>,
    ) -> Result<ResourceRef> {
        self.composite.require_ready()?;
        let short = service_name.rsplit('.').next().unwrap_or(service_name);
        self.add_endpoint(stack, &format!("{}Endpoint", short), "interface", service_name, subnets)
    }

    pub fn add_gateway_endpoint(
        &mut self,
        stack: &mut Stack,
        service: GatewayService,
        subnets: Option<SubnetType>,
    ) -> Result<ResourceRef> {
        self.composite.require_ready()?;
        self.add_endpoint(
            stack,
            &format!("{}Endpoint", service),
            "gateway",
            service.service_name(),
            subnets,
        )
    }

    fn add_endpoint(
        &mut self,
        stack: &mut Stack,
        id: &str,
        endpoint_type: &str,
        service: &str,
        subnets: Option<SubnetType>,
    ) -> Result<ResourceRef> {
        let subnets = subnets.map(serde_json::to_value).transpose()?;
        let spec = ResourceSpec::new(ResourceKind::NetworkEndpoint)
            .reference("network", self.vpc)
            .option("endpoint_type", endpoint_type)
            .option("service", service)
            .maybe_option("subnets", subnets);

        let endpoint = self.composite.create(stack, id, spec)?;
        tracing::debug!("{}: {} endpoint for {}", self.composite.path(), endpoint_type, service);
        self.endpoints.push(endpoint);
        Ok(endpoint)
    }
}

impl Construct for StandardNetwork {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}
