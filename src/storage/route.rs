//! Persisted route records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capture::StorableResponse;
use crate::key::{hash_alias, normalize_alias};
use crate::{AcacheError, Result};

/// Status replayed for records written without one
const DEFAULT_STATUS: u16 = 200;

fn default_status() -> u16 {
    DEFAULT_STATUS
}

/// A captured response bound to an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Storage key, always the hash of `alias`
    #[serde(rename = "key")]
    pub id: String,
    /// Upstream location the response was captured from
    pub url: String,
    /// Local path the response is replayed under
    pub alias: String,
    /// Captured body
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
    /// Captured `Content-Type`, empty if absent
    #[serde(rename = "contentType", default)]
    pub content_type: String,
    /// Captured status code
    #[serde(rename = "statusCode", default = "default_status")]
    pub status_code: u16,
    /// Captured headers, lowercase name to ordered values
    #[serde(rename = "header", default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl Route {
    /// Build a route from a captured response
    ///
    /// # Errors
    ///
    /// Returns error if the alias is invalid
    pub fn from_response(url: &str, alias: &str, response: StorableResponse) -> Result<Self> {
        let alias = normalize_alias(alias)?;
        let content_type = response.content_type().unwrap_or_default().to_string();

        Ok(Self {
            id: hash_alias(&alias),
            url: url.to_string(),
            alias,
            data: response.body,
            content_type,
            status_code: response.status_code,
            headers: response.header,
        })
    }

    /// Decode a stored record
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a valid route record
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| AcacheError::Decode {
            key: key.to_string(),
            source,
        })
    }

    /// Encode for storage
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Check the fields the store relies on
    ///
    /// # Errors
    ///
    /// Returns error if `id` or `alias` is empty
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(AcacheError::InvalidRoute("empty key".to_string()));
        }
        if self.alias.is_empty() {
            return Err(AcacheError::InvalidRoute(format!(
                "empty alias for key {}",
                self.id
            )));
        }
        Ok(())
    }
}

/// Snapshot of every stored route, in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routes(Vec<Route>);

impl Routes {
    /// Wrap an already ordered list
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self(routes)
    }

    /// True if any route was captured from exactly `url`
    #[must_use]
    pub fn contains_url(&self, url: &str) -> bool {
        self.0.iter().any(|route| route.url == url)
    }

    /// Number of routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no routes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.0.iter()
    }

    /// Numbered one-line-per-route listing
    #[must_use]
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, route)| format!("{i}) {} -> {}\n", route.url, route.alias))
            .collect()
    }

    /// Numbered listing with key and content type
    #[must_use]
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, route)| {
                format!(
                    "{i}) {}\n\tAlias: {}\n\tKey: {}\n\tContent-Type: {}\n",
                    route.url, route.alias, route.id, route.content_type
                )
            })
            .collect()
    }
}

impl IntoIterator for Routes {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Routes {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
