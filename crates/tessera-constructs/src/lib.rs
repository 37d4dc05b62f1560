//! Opinionated composite constructs
//!
//! Each composite registers its resource nodes under its own tree node,
//! reaches `ready` inside its constructor and exposes a small set of named
//! outputs. Additive methods (`add_*`, `grant_*`) never replace existing
//! entries.

pub mod compute;
pub mod function;
pub mod network;
pub mod rules;
pub mod security;
pub mod storage;
pub mod table;

pub use compute::{InstanceProps, StandardInstance};
pub use function::{FunctionProps, ManagedFunction};
pub use network::{GatewayService, NetworkProps, StandardNetwork, SubnetConfiguration, SubnetType};
pub use rules::{IngressRule, Peer, Port, Protocol};
pub use security::CommonSecurityGroups;
pub use storage::{
    BucketProps, LifecycleRule, RemovalPolicy, SecureBucket, StorageClass, Transition,
};
pub use table::{
    Attribute, AttributeType, BillingMode, EnhancedTable, GlobalIndex, ProjectionType,
    StreamViewType,
    TableProps,
};
