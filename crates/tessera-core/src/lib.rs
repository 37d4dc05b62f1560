//! tessera core
//!
//! Provider-agnostic model for declaring infrastructure as a small graph of
//! typed resources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            patterns (website, api)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │ public outputs only
//! ┌─────────────────▼───────────────────────────────┐
//! │     composites (network, bucket, table, ...)    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  tessera-core                   │
//! │  ┌───────────────┐ ┌──────────┐ ┌────────────┐  │
//! │  │ ConstructTree │ │ Resource │ │ GrantLedger│  │
//! │  │ (append-only) │ │ defaults │ │ (intents)  │  │
//! │  └───────────────┘ └──────────┘ └────────────┘  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait Provisioner
//! ┌─────────────────▼───────────────────────────────┐
//! │        provisioning engine (external)           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tessera_core::{Capability, GrantRequest, ResourceKind, ResourceSpec, Stack};
//!
//! let mut stack = Stack::new("shop")?;
//! let root = stack.root();
//! let table = stack.create(root, "Orders", ResourceSpec::new(ResourceKind::Table))?;
//! let function = stack.create(
//!     root,
//!     "Handler",
//!     ResourceSpec::new(ResourceKind::Function).option("code_path", "./handler"),
//! )?;
//! stack.grant(root, GrantRequest::new(function, table).allow(Capability::Read))?;
//!
//! let manifest = stack.manifest()?;
//! assert_eq!(manifest.resources.len(), 2);
//! # Ok::<(), tessera_core::ConstructError>(())
//! ```

pub mod construct;
pub mod error;
pub mod grant;
pub mod manifest;
pub mod naming;
pub mod provider;
pub mod resource;
pub mod stack;
pub mod tree;

// Re-exports
pub use construct::{Composite, Construct, ConstructState, Output, Pattern};
pub use error::{BoxError, ConstructError, Result};
pub use grant::{
    Capability, GrantEdge, GrantId, GrantLedger, GrantRequest, Principal, supported_capabilities,
};
pub use manifest::{Manifest, ManifestSummary};
pub use provider::{PermissionDeclaration, Provisioner, ResourceDeclaration};
pub use resource::{OptionMap, ResourceKind, ResourceNode, ResourceRef, ResourceSpec};
pub use stack::{MANAGED_BY_TAG, MANAGED_BY_VALUE, Stack};
pub use tree::{ConstructId, ConstructPath, ConstructTree, NodeKind};
