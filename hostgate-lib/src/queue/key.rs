use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use url::Url;

use crate::ErrorKind;
use crate::types::Result;

/// The key of the wildcard policy, consulted when nothing more specific
/// is registered
pub const WILDCARD: &str = "*";

/// Identifies an admission-control domain.
///
/// By default this is the host of the request URL, including the port if
/// the URL spells one out. Callers may pick any other string to group hosts
/// under one limiter or to split a host into several.
///
/// # Examples
///
/// ```
/// use hostgate_lib::queue::RoutingKey;
/// use url::Url;
///
/// let url = Url::parse("https://api.github.com/repos/user/repo").unwrap();
/// let key = RoutingKey::try_from(&url).unwrap();
/// assert_eq!(key.as_str(), "api.github.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct RoutingKey(String);

impl RoutingKey {
    /// The wildcard key
    #[must_use]
    pub fn wildcard() -> Self {
        RoutingKey(WILDCARD.to_string())
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the key as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// `true` for the wildcard key
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Keys consulted for policy lookup, most specific first.
    ///
    /// The chain is the key itself, the key without its port, every parent
    /// domain that still has a dot, and finally the wildcard:
    ///
    /// ```
    /// use hostgate_lib::queue::RoutingKey;
    ///
    /// let chain: Vec<_> = RoutingKey::from("api.eu.example.com:8443")
    ///     .fallbacks()
    ///     .into_iter()
    ///     .map(RoutingKey::into_string)
    ///     .collect();
    /// assert_eq!(
    ///     chain,
    ///     ["api.eu.example.com:8443", "api.eu.example.com", "eu.example.com", "example.com", "*"]
    /// );
    /// ```
    #[must_use]
    pub fn fallbacks(&self) -> Vec<RoutingKey> {
        let mut chain = vec![self.clone()];
        if self.is_wildcard() {
            return chain;
        }

        let host = strip_port(&self.0);
        if host != self.0 {
            chain.push(RoutingKey(host.to_string()));
        }

        if !is_ip_literal(host) {
            let mut rest = host;
            while let Some((_, parent)) = rest.split_once('.') {
                if !parent.contains('.') {
                    break;
                }
                chain.push(RoutingKey(parent.to_string()));
                rest = parent;
            }
        }

        chain.push(RoutingKey::wildcard());
        chain
    }
}

/// Remove a trailing `:port`, taking care not to cut IPv6 literals
fn strip_port(key: &str) -> &str {
    if key.starts_with('[') {
        return key.find(']').map_or(key, |end| &key[..=end]);
    }
    match key.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => key,
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.starts_with('[') || host.parse::<IpAddr>().is_ok()
}

impl TryFrom<&Url> for RoutingKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or(ErrorKind::InvalidUrlHost)?;

        // Normalize to lowercase for consistent lookup
        let key = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(RoutingKey(key.to_lowercase()))
    }
}

impl TryFrom<Url> for RoutingKey {
    type Error = ErrorKind;

    fn try_from(url: Url) -> Result<Self> {
        RoutingKey::try_from(&url)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoutingKey {
    fn from(key: String) -> Self {
        RoutingKey(key.to_lowercase())
    }
}

impl From<&str> for RoutingKey {
    fn from(key: &str) -> Self {
        RoutingKey(key.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_key_from_url() {
        let url = Url::parse("https://api.github.com/repos/user/repo").unwrap();
        let key = RoutingKey::try_from(&url).unwrap();
        assert_eq!(key.as_str(), "api.github.com");
    }

    #[test]
    fn test_key_normalization() {
        let url = Url::parse("https://API.GITHUB.COM/repos/user/repo").unwrap();
        let key = RoutingKey::try_from(&url).unwrap();
        assert_eq!(key.as_str(), "api.github.com");
    }

    #[test]
    fn test_key_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(RoutingKey::try_from(&url).unwrap().as_str(), "127.0.0.1:8080");

        // Default ports are not part of the key
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(RoutingKey::try_from(&url).unwrap().as_str(), "example.com");
    }

    #[test]
    fn test_key_subdomain_separation() {
        let api = RoutingKey::try_from(&Url::parse("https://api.github.com/").unwrap()).unwrap();
        let www = RoutingKey::try_from(&Url::parse("https://www.github.com/").unwrap()).unwrap();
        assert_ne!(api, www);
    }

    #[test]
    fn test_key_no_host() {
        let url = Url::parse("file:///path/to/file").unwrap();
        assert!(RoutingKey::try_from(&url).is_err());
    }

    #[test]
    fn test_key_hash_equality() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(RoutingKey::from("example.com"), "value");

        assert_eq!(map.get(&RoutingKey::from("EXAMPLE.COM")), Some(&"value"));
    }

    #[rstest]
    #[case("example.com", &["example.com", "*"])]
    #[case("api.github.com", &["api.github.com", "github.com", "*"])]
    #[case("localhost", &["localhost", "*"])]
    #[case("localhost:3000", &["localhost:3000", "localhost", "*"])]
    #[case("127.0.0.1:8080", &["127.0.0.1:8080", "127.0.0.1", "*"])]
    #[case("10.0.0.1", &["10.0.0.1", "*"])]
    #[case("[::1]:8080", &["[::1]:8080", "[::1]", "*"])]
    #[case("shared-apis", &["shared-apis", "*"])]
    #[case("*", &["*"])]
    fn test_fallbacks(#[case] key: &str, #[case] expected: &[&str]) {
        let chain: Vec<String> = RoutingKey::from(key)
            .fallbacks()
            .into_iter()
            .map(RoutingKey::into_string)
            .collect();
        assert_eq!(chain, expected);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let key: RoutingKey = serde_json::from_str(r#""Example.COM""#).unwrap();
        assert_eq!(key.as_str(), "example.com");
    }
}
