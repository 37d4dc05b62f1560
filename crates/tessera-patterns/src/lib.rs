//! Patterns: composites of composites
//!
//! A pattern instantiates composite constructs under its own tree node and
//! wires them together through their public outputs only.
//!
//! ```
//! use tessera_core::Stack;
//! use tessera_patterns::{ServerlessApi, ServerlessApiProps};
//!
//! let mut stack = Stack::new("shop")?;
//! let root = stack.root();
//! let api = ServerlessApi::new(
//!     &mut stack,
//!     root,
//!     "Orders",
//!     ServerlessApiProps {
//!         code_path: Some("./lambda".into()),
//!         ..Default::default()
//!     },
//! )?;
//! assert!(api.usage_plan().is_none());
//! # Ok::<(), tessera_core::ConstructError>(())
//! ```

pub mod serverless_api;
pub mod website;
pub mod zone;

pub use serverless_api::{ServerlessApi, ServerlessApiProps};
pub use website::{StaticWebsite, WebsiteProps};
pub use zone::{HostedZone, HostedZoneLookup, LookupError, StaticHostedZones};
