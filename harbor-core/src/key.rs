//! Cache key type.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier for a cached asset (in practice, a URL).
///
/// Equality is exact string equality. No normalization is applied, so
/// `https://a/x`, `https://a/x/` and `HTTPS://a/x` are three distinct keys.
/// An empty string never forms a key; see [`CacheKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Build a key, returning `None` for an empty string.
    pub fn new(key: &str) -> Option<Self> {
        if key.is_empty() {
            None
        } else {
            Some(Self(Arc::from(key)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| "cache key must not be empty".to_string())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0.to_string()
    }
}
