//! Storage key derivation for route aliases

use sha2::{Digest, Sha256};

use crate::{AcacheError, Result};

/// Normalize an operator-supplied alias
///
/// Surrounding whitespace and leading slashes are dropped, so `"/users"` and
/// `"users"` name the same route.
///
/// # Errors
///
/// Returns error if the alias is empty or cannot be used as a path
pub fn normalize_alias(alias: &str) -> Result<String> {
    let trimmed = alias.trim().trim_start_matches('/');

    if trimmed.is_empty() {
        return Err(AcacheError::InvalidAlias(alias.to_string()));
    }

    let bad_char = trimmed
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#');
    if bad_char || trimmed.split('/').any(str::is_empty) {
        return Err(AcacheError::InvalidAlias(alias.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Compute the storage key of an alias
///
/// Lowercase hex SHA-256 of the normalized alias bytes.
///
/// # Errors
///
/// Returns error if the alias is invalid
pub fn alias_key(alias: &str) -> Result<String> {
    let alias = normalize_alias(alias)?;
    Ok(hash_alias(&alias))
}

/// Hash an already-normalized alias
#[must_use]
pub fn hash_alias(alias: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(alias.as_bytes());
    hex::encode(hasher.finalize())
}

/// Replay path of a normalized alias
#[must_use]
pub fn route_path(alias: &str) -> String {
    format!("/{}", alias.trim_start_matches('/'))
}
