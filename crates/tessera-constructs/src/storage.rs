//! Secure storage bucket

use serde::{Deserialize, Serialize};
use tessera_core::{
    Capability, Composite, Construct, ConstructId, ConstructState, GrantId, GrantRequest, OptionMap,
    Principal, ResourceKind, ResourceRef, ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    Retain,
    Destroy,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageClass {
    InfrequentAccess,
    Archive,
    DeepArchive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub storage_class: StorageClass,
    pub transition_after_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_days: Option<u32>,
}

impl LifecycleRule {
    pub fn transition(mut self, storage_class: StorageClass, after_days: u32) -> Self {
        self.transitions.push(Transition {
            storage_class,
            transition_after_days: after_days,
        });
        self
    }

    pub fn expire_after(mut self, days: u32) -> Self {
        self.expiration_days = Some(days);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    pub bucket_name: Option<String>,
    /// Key identifier; switches encryption from managed to kms
    pub encryption_key: Option<String>,
    pub versioned: Option<bool>,
    pub enforce_ssl: Option<bool>,
    pub removal_policy: Option<RemovalPolicy>,
    pub auto_delete_objects: Option<bool>,
    /// Replaces the default rule when set
    pub lifecycle_rules: Option<Vec<LifecycleRule>>,
    pub enable_access_logging: bool,
    pub extra: OptionMap,
}

#[derive(Debug, Clone)]
pub struct SecureBucket {
    composite: Composite,
    bucket: ResourceRef,
    log_bucket: Option<ResourceRef>,
}

impl SecureBucket {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: BucketProps,
    ) -> Result<Self> {
        let mut composite = Composite::declare(stack, parent, id, "secure-bucket")?;

        let log_bucket = if props.enable_access_logging {
            Some(composite.create(
                stack,
                "LogBucket",
                ResourceSpec::new(ResourceKind::StorageBucket)
                    .option(
                        "lifecycle_rules",
                        serde_json::to_value([LifecycleRule::default().expire_after(90)])?,
                    ),
            )?)
        } else {
            None
        };

        let encryption = props.encryption_key.as_ref().map(|_| "kms");
        let removal_policy = props.removal_policy.map(serde_json::to_value).transpose()?;
        let lifecycle_rules = props.lifecycle_rules.map(serde_json::to_value).transpose()?;

        let spec = ResourceSpec::new(ResourceKind::StorageBucket)
            .maybe_option("bucket_name", props.bucket_name)
            .maybe_option("encryption", encryption)
            .maybe_option("encryption_key", props.encryption_key)
            .maybe_option("versioned", props.versioned)
            .maybe_option("enforce_ssl", props.enforce_ssl)
            .maybe_option("removal_policy", removal_policy)
            .maybe_option("auto_delete_objects", props.auto_delete_objects)
            .maybe_option("lifecycle_rules", lifecycle_rules)
            .maybe_reference("server_access_logs_bucket", log_bucket)
            .options(props.extra);

        let bucket = composite.create(stack, "Bucket", spec)?;
        composite.advance(ConstructState::BaseCreated)?;

        let bucket_name = stack.resource(bucket)?.name.clone();
        composite.expose_resource("bucket", bucket);
        composite.expose_value("bucket_name", bucket_name);
        composite.finish()?;

        Ok(Self {
            composite,
            bucket,
            log_bucket,
        })
    }

    pub fn bucket(&self) -> Result<ResourceRef> {
        self.composite.resource_output("bucket")
    }

    pub fn bucket_name(&self) -> Result<&str> {
        self.composite.value_output("bucket_name")
    }

    pub fn log_bucket(&self) -> Option<ResourceRef> {
        self.log_bucket
    }

    pub fn grant_read(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.grant(stack, subject, &[Capability::Read])
    }

    pub fn grant_write(
        &mut self,
        stack: &mut Stack,
        subject: impl Into<Principal>,
    ) -> Result<GrantId> {
        self.grant(stack, subject, &[Capability::Write])
    }

    pub fn grant_read_write(
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
            GrantRequest::new(subject, self.bucket).allow_all(capabilities.iter().copied());
        self.composite.grant(stack, request)
    }

    pub fn add_lifecycle_rule(&self, stack: &mut Stack, rule: &LifecycleRule) -> Result<()> {
        self.composite.require_ready()?;
        stack.append_option(self.bucket, "lifecycle_rules", serde_json::to_value(rule)?)
    }
}

impl Construct for SecureBucket {
    fn composite(&self) -> &Composite {
        &self.composite
    }
}
