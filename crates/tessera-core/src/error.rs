//! Declaration-time errors
//!
//! Every variant identifies the offending construct path, option or
//! capability. Nothing here is retried: the first error ends the pass.

use crate::construct::ConstructState;
use crate::grant::Capability;
use crate::resource::ResourceKind;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConstructError {
    #[error("duplicate construct id '{id}' under '{parent}'")]
    DuplicateId { parent: String, id: String },

    #[error("invalid construct id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error("parent construct not found: {0}")]
    ParentNotFound(String),

    #[error("unknown resource reference: {0}")]
    UnknownResource(String),

    #[error(
        "option '{option}' is not supported by {kind} (it belongs to {recognized_by}) at '{node}'"
    )]
    UnsupportedOption {
        node: String,
        kind: ResourceKind,
        option: String,
        recognized_by: ResourceKind,
    },

    #[error("{kind} '{target}' does not support the '{capability}' capability")]
    UnsupportedCapability {
        target: String,
        kind: ResourceKind,
        capability: Capability,
    },

    #[error("grant on '{target}' requests no capabilities")]
    EmptyGrant { target: String },

    #[error("option '{option}' of '{node}' cannot be changed after creation")]
    ImmutableOption { node: String, option: String },

    #[error("option '{option}' of '{node}' already has an entry '{key}'")]
    DuplicateEntry {
        node: String,
        option: String,
        key: String,
    },

    #[error("invalid value for '{option}' at '{node}': {reason}")]
    InvalidOption {
        node: String,
        option: String,
        reason: String,
    },

    #[error("domain '{domain}' requires a hosted zone id or hosted zone name")]
    MissingHostedZone { domain: String },

    #[error("hosted zone lookup for '{name}' failed: {source}")]
    HostedZoneLookup {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("outputs of '{construct}' are not readable in state {state}")]
    NotReady {
        construct: String,
        state: ConstructState,
    },

    #[error("'{construct}' cannot move from {from} to {to}")]
    InvalidTransition {
        construct: String,
        from: ConstructState,
        to: ConstructState,
    },

    #[error("'{construct}' exposes no outputs")]
    NoOutputs { construct: String },

    #[error("'{construct}' has no output named '{output}'")]
    UnknownOutput { construct: String, output: String },

    #[error("dependency of '{node}' on '{dependency}' would form a cycle")]
    DependencyCycle { node: String, dependency: String },

    #[error("'{construct}' requires a function code path")]
    MissingCodePath { construct: String },

    #[error("provisioner rejected declaration: {0}")]
    Provisioner(String),

    #[error("configuration error: {0}")]
    Config(#[from] tessera_config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConstructError>;
