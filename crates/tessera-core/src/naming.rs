//! Generated physical names and deploy-time attribute tokens

use crate::tree::ConstructPath;
use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 63;
const HASH_LEN: usize = 8;

/// Deterministic physical name for the node at `path`
///
/// The stack name is kept, the remaining ids are joined with `-`, characters
/// outside `[a-z0-9-]` are dropped and an 8-hex digest of the full path is
/// appended so two paths that sanitize alike still get distinct names.
pub fn generate_name(path: &ConstructPath) -> String {
    let digest = Sha256::digest(path.to_string().as_bytes());
    let suffix = &hex::encode(digest)[..HASH_LEN];

    let mut stem: String = path
        .segments()
        .join("-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    stem.truncate(MAX_NAME_LEN - HASH_LEN - 1);
    let stem = stem.trim_end_matches('-');

    format!("{}-{}", stem, suffix)
}

/// Placeholder for an attribute only known after deployment
pub fn attribute_token(path: &ConstructPath, attribute: &str) -> String {
    format!("${{{}.{}}}", path, attribute)
}
