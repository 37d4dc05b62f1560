//! Hosted-zone lookup
//!
//! Looking a zone up by name is the only call that leaves the process. It
//! blocks, has no timeout or retry, and its failure is returned unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_core::BoxError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

impl HostedZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub trait HostedZoneLookup {
    fn lookup(&self, name: &str) -> Result<HostedZone, BoxError>;
}

impl<F> HostedZoneLookup for F
where
    F: Fn(&str) -> Result<HostedZone, BoxError>,
{
    fn lookup(&self, name: &str) -> Result<HostedZone, BoxError> {
        self(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no hosted zone named '{0}'")]
    NotFound(String),
}

/// In-memory zones keyed by name
#[derive(Debug, Clone, Default)]
pub struct StaticHostedZones {
    zones: BTreeMap<String, HostedZone>,
}

impl StaticHostedZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.insert(HostedZone::new(id, name));
        self
    }

    pub fn insert(&mut self, zone: HostedZone) {
        self.zones.insert(normalize(&zone.name), zone);
    }
}

impl HostedZoneLookup for StaticHostedZones {
    fn lookup(&self, name: &str) -> Result<HostedZone, BoxError> {
        tracing::debug!("Looking up hosted zone {}", name);
        self.zones
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.to_string()).into())
    }
}

// Zone names compare without the trailing root dot.
fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}
