use serde::Serialize;
use std::fmt;
use url::Url;

use crate::cache::CacheError;
use crate::types::RequestOptions;

/// Deterministic cache key of a request.
///
/// Built from the URL and either the caller's `cache_by` value or, when that
/// is absent or `null`, the request options. Header maps serialize in sorted order, so
/// equal options always produce equal fingerprints.
///
/// ```
/// use hostgate_lib::RequestOptions;
/// use hostgate_lib::cache::Fingerprint;
/// use serde_json::json;
/// use url::Url;
///
/// let url = Url::parse("https://api.example.com/items").unwrap();
/// let fingerprint = Fingerprint::new(&url, Some(&json!({"page": 1})), &RequestOptions::new()).unwrap();
/// assert_eq!(fingerprint.as_str(), r#"https://api.example.com/items::{"page":1}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a request
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Fingerprint`] if the discriminating value cannot
    /// be serialized to JSON.
    pub fn new(
        url: &Url,
        cache_by: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<Self, CacheError> {
        let discriminator = match cache_by {
            Some(value) if !value.is_null() => serde_json::to_string(value),
            _ => serde_json::to_string(options),
        }
        .map_err(CacheError::Fingerprint)?;

        Ok(Self(format!("{url}::{discriminator}")))
    }

    /// Get the fingerprint as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
