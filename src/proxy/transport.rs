//! HTTP transport used for relay and direct attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::errors::AttemptError;
use crate::proxy::normalize::{looks_like_html, normalize};
use crate::proxy::request::RequestSpec;

/// Raw response of one attempt, body not yet parsed.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    /// Classify the response. An HTML body wins over the status code so a
    /// relay's `502` error page is reported as the wrong content type.
    pub fn classify(self) -> Result<Value, AttemptError> {
        if looks_like_html(&self.body) {
            return Err(AttemptError::WrongContentType);
        }
        if !self.status.is_success() {
            return Err(AttemptError::Transport(format!("HTTP {}", self.status)));
        }
        normalize(&self.body)
    }
}

/// Sends a request to a concrete URL and hands back the body as text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, spec: &RequestSpec) -> Result<RawResponse, AttemptError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `attempt_timeout` also bounds reqwest's own request timeout; the
    /// resolver applies the same deadline around every attempt.
    pub fn new(attempt_timeout: Duration) -> Result<Self, AttemptError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(8)
            .timeout(attempt_timeout)
            .connect_timeout(Duration::from_secs(5).min(attempt_timeout))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, spec: &RequestSpec) -> Result<RawResponse, AttemptError> {
        let mut req = self
            .client
            .request(spec.method.clone(), url)
            .headers(spec.headers.clone());
        if let Some(body) = &spec.body {
            req = req.body(body.clone());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_html_error_page_beats_status() {
        assert_eq!(
            raw(502, "<html>Error 502</html>").classify(),
            Err(AttemptError::WrongContentType)
        );
        assert_eq!(
            raw(200, "<!DOCTYPE html>").classify(),
            Err(AttemptError::WrongContentType)
        );
    }

    #[test]
    fn test_non_success_status_is_transport_error() {
        assert_eq!(
            raw(429, r#"{"error":"slow down"}"#).classify(),
            Err(AttemptError::Transport("HTTP 429 Too Many Requests".into()))
        );
    }

    #[test]
    fn test_success_parses_json() {
        assert_eq!(raw(200, r#"{"ok":true}"#).classify().unwrap(), json!({"ok": true}));
    }
}
