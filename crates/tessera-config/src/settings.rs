//! `tessera.kdl` parsing
//!
//! ```kdl
//! stack "orders"
//! region "eu-west-1"
//! account "123456789012"
//! tags {
//!     Team "platform"
//!     CostCenter "42"
//! }
//! ```

use crate::error::{ConfigError, Result};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Stack-wide settings shared by every construct declared in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Stack name, used as the root of every construct path
    pub stack: String,

    /// Target region (advisory, forwarded to the provisioning engine)
    pub region: Option<String>,

    /// Target account (advisory, forwarded to the provisioning engine)
    pub account: Option<String>,

    /// Tags applied to every resource in the stack
    pub tags: BTreeMap<String, String>,

    /// File the settings were read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stack: "app".to_string(),
            region: None,
            account: None,
            tags: BTreeMap::new(),
            source: None,
        }
    }
}

/// Parse a settings file
pub fn parse_settings_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut settings = parse(&content, path)?;
    settings.source = Some(path.to_path_buf());
    tracing::debug!("Loaded settings for stack '{}' from {}", settings.stack, path.display());
    Ok(settings)
}

/// Parse settings from a KDL string
pub fn parse_settings_str(content: &str) -> Result<Settings> {
    parse(content, Path::new("<inline>"))
}

fn parse(content: &str, origin: &Path) -> Result<Settings> {
    let doc: KdlDocument = content.parse()?;

    let invalid = |message: String| ConfigError::InvalidSettings {
        path: origin.to_path_buf(),
        message,
    };

    let mut stack = None;
    let mut settings = Settings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                let name = first_string(node)
                    .ok_or_else(|| invalid("stack requires a name".to_string()))?;
                if name.is_empty() || name.contains('/') {
                    return Err(invalid(format!("invalid stack name '{}'", name)));
                }
                stack = Some(name.to_string());
            }
            "region" => settings.region = first_string(node).map(str::to_string),
            "account" => settings.account = first_string(node).map(str::to_string),
            "tags" => {
                if let Some(children) = node.children() {
                    for tag in children.nodes() {
                        let key = tag.name().value().to_string();
                        let value = first_string(tag)
                            .ok_or_else(|| {
                                invalid(format!("tag '{}' requires a string value", key))
                            })?;
                        settings.tags.insert(key, value.to_string());
                    }
                }
            }
            other => {
                tracing::debug!("Ignoring unknown settings node '{}'", other);
            }
        }
    }

    settings.stack = stack.ok_or_else(|| invalid("missing `stack` node".to_string()))?;
    Ok(settings)
}

fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries().first().and_then(|e| e.value().as_string())
}
