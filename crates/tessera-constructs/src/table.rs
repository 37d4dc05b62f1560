//! Key-value table with point-in-time recovery on by default

use crate::storage::RemovalPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_core::{
    Capability, Composite, Construct, ConstructError, ConstructId, ConstructState, GrantId,
    GrantRequest, OptionMap, Principal, ResourceKind, ResourceRef, ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillingMode {
    #[default]
    OnDemand,
    Provisioned { read_capacity: u32, write_capacity: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionType {
    #[default]
    All,
    KeysOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalIndex {
    pub index_name: String,
    pub partition_key: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<Attribute>,
    #[serde(default)]
    pub projection: ProjectionType,
}

impl GlobalIndex {
    pub fn new(index_name: impl Into<String>, partition_key: Attribute) -> Self {
        Self {
            index_name: index_name.into(),
            partition_key,
            sort_key: None,
            projection: ProjectionType::All,
        }
    }

    pub fn sorted_by(mut self, sort_key: Attribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableProps {
    pub table_name: Option<String>,
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,
    pub billing_mode: BillingMode,
    pub point_in_time_recovery: Option<bool>,
    pub removal_policy: Option<RemovalPolicy>,
    pub stream: Option<StreamViewType>,
    pub time_to_live_attribute: Option<String>,
    pub global_secondary_indexes: Vec<GlobalIndex>,
    pub extra: OptionMap,
}

impl TableProps {
    pub fn new(partition_key: Attribute) -> Self {
        Self {
            table_name: None,
            partition_key,
            sort_key: None,
            billing_mode: BillingMode::default(),
            point_in_time_recovery: None,
            removal_policy: None,
            stream: None,
            time_to_live_attribute: None,
            global_secondary_indexes: Vec::new(),
            extra: OptionMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnhancedTable {
    composite: Composite,
    table: ResourceRef,
}

impl EnhancedTable {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: TableProps,
    ) -> Result<Self> {
        let table_path = stack.path(parent).child(id).child("Table").to_string();
        if props.partition_key.name.trim().is_empty() {
            return Err(ConstructError::InvalidOption {
                node: table_path,
                option: "partition_key".to_string(),
                reason: "partition key name is empty".to_string(),
            });
        }
        if let BillingMode::Provisioned {
            read_capacity,
            write_capacity,
        } = props.billing_mode
            && (read_capacity == 0 || write_capacity == 0)
        {
            return Err(ConstructError::InvalidOption {
                node: table_path,
                option: "billing_mode".to_string(),
                reason: "provisioned billing needs non-zero read and write capacity".to_string(),
            });
        }
        check_unique_indexes(&table_path, &props.global_secondary_indexes)?;

        let mut composite = Composite::declare(stack, parent, id, "table")?;

        let mut spec = ResourceSpec::new(ResourceKind::Table)
            .maybe_option("table_name", props.table_name)
            .option("partition_key", serde_json::to_value(&props.partition_key)?)
            .maybe_option("sort_key", props.sort_key.map(serde_json::to_value).transpose()?)
            .maybe_option("point_in_time_recovery", props.point_in_time_recovery)
            .maybe_option(
                "removal_policy",
                props.removal_policy.map(serde_json::to_value).transpose()?,
            )
            .maybe_option("stream", props.stream.map(serde_json::to_value).transpose()?)
            .maybe_option("time_to_live_attribute", props.time_to_live_attribute)
            .option(
                "global_secondary_indexes",
                serde_json::to_value(&props.global_secondary_indexes)?,
            );
        if let BillingMode::Provisioned {
            read_capacity,
            write_capacity,
        } = props.billing_mode
        {
            spec = spec
                .option("billing_mode", "provisioned")
                .option("read_capacity", read_capacity)
                .option("write_capacity", write_capacity);
        }

        let table = composite.create(stack, "Table", spec.options(props.extra))?;
        composite.advance(ConstructState::BaseCreated)?;

        let table_name = stack.resource(table)?.name.clone();
        composite.expose_resource("table", table);
        composite.expose_value("table_name", table_name);
        composite.finish()?;

        Ok(Self { composite, table })
    }

    pub fn table(&self) -> Result<ResourceRef> {
        self.composite.resource_output("table")
    }

    pub fn table_name(&self) -> Result<&str> {
        self.composite.value_output("table_name")
    }

    pub fn add_global_secondary_index(&self, stack: &mut Stack, index: GlobalIndex) -> Result<()> {
        self.composite.require_ready()?;
        let node = stack.resource(self.table)?;
        let exists = node
            .option("global_secondary_indexes")
            .and_then(Value::as_array)
            .is_some_and(|indexes| {
                indexes
                    .iter()
                    .any(|i| i["index_name"].as_str() == Some(index.index_name.as_str()))
            });
        if exists {
            return Err(ConstructError::DuplicateEntry {
                node: node.path.to_string(),
                option: "global_secondary_indexes".to_string(),
                key: index.index_name,
            });
        }
        stack.append_option(self.table, "global_secondary_indexes", serde_json::to_value(&index)?)
    }

    pub fn grant_read_data(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.grant(stack, subject, &[Capability::Read])
    }

    pub fn grant_write_data(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.grant(stack, subject, &[Capability::Write])
    }

    pub fn grant_read_write_data(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.grant(stack, subject, &[Capability::Read, Capability::Write])
    }

    fn grant(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
        capabilities: &[Capability],
    ) -> Result<GrantId> {
        self.composite.require_ready()?;
        let request =
            GrantRequest::new(subject, self.table).allow_all(capabilities.iter().copied());
        self.composite.grant(stack, request)
    }
}

fn check_unique_indexes(table_path: &str, indexes: &[GlobalIndex]) -> Result<()> {
    for (i, index) in indexes.iter().enumerate() {
        if indexes[..i].iter().any(|other| other.index_name == index.index_name) {
            return Err(ConstructError::DuplicateEntry {
                node: table_path.to_string(),
                option: "global_secondary_indexes".to_string(),
                key: index.index_name.clone(),
            });
        }
    }
    Ok(())
}

impl Construct for EnhancedTable {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}
