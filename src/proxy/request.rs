use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::errors::GatewayError;

/// Ordered, multi-valued query parameters.
///
/// Insertion order is kept and a repeated key is appended, never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Drop every pair whose key matches `key`. Returns how many were removed.
    pub fn remove_key(&mut self, key: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|(k, _)| k != key);
        before - self.0.len()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    pub fn from_query(query: &str) -> Self {
        Self(url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Explicit method; wins over the body-presence inference.
    pub method: Option<Method>,
    pub body: Option<Value>,
    pub params: QueryParams,
}

/// A fully-resolved outbound request, built fresh per call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub target_url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Whether a body counts as "supplied" for method inference.
pub(crate) fn has_body(body: Option<&Value>) -> bool {
    match body {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

pub fn build(base_url: &str, opts: BuildOptions) -> Result<RequestSpec, GatewayError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| GatewayError::InvalidRequest(format!("bad backend URL '{}': {}", base_url, e)))?;

    if !opts.params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in opts.params.iter() {
            pairs.append_pair(k, v);
        }
    }

    let method = opts.method.unwrap_or_else(|| {
        if has_body(opts.body.as_ref()) {
            Method::POST
        } else {
            Method::GET
        }
    });

    let body = if method == Method::GET {
        None
    } else {
        let value = match opts.body {
            Some(v) if !v.is_null() => v,
            _ => Value::Object(Default::default()),
        };
        let encoded = serde_json::to_vec(&value)
            .map_err(|e| GatewayError::InvalidRequest(format!("body is not serializable: {}", e)))?;
        Some(Bytes::from(encoded))
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(RequestSpec {
        target_url: url.into(),
        method,
        headers,
        body,
    })
}
