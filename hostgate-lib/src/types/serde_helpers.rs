//! Serializers for `http` types that don't implement [`serde::Serialize`].

use std::collections::BTreeMap;

use http::{HeaderMap, Method, StatusCode};
use serde::{Serialize, Serializer};

/// Serialize headers as a sorted map, joining repeated values with `, `
pub(crate) fn serialize_headers<S>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map: BTreeMap<&str, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match map.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                map.insert(name.as_str(), value.into_owned());
            }
        }
    }
    map.serialize(serializer)
}

pub(crate) fn serialize_method<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(method.as_str())
}

pub(crate) fn serialize_status<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[derive(Serialize)]
    struct Wrapper(#[serde(serialize_with = "serialize_headers")] HeaderMap);

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));

        let json = serde_json::to_string(&Wrapper(headers)).unwrap();
        assert_eq!(json, r#"{"accept":"text/html, application/json"}"#);
    }
}
