//! The facade every caller goes through.
//!
//! [`Gateway::call`] never fails and never panics outward: whatever happens
//! below it comes back as an [`ApiEnvelope`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::FutureExt;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::cache::{CachingGateway, ResourceCache};
use crate::config::{Config, GatewayMode};
use crate::envelope::ApiEnvelope;
use crate::errors::GatewayError;
use crate::proxy::direct::DirectFallbackTransport;
use crate::proxy::registry::ProxyRegistry;
use crate::proxy::request::{build as build_request, BuildOptions, QueryParams};
use crate::proxy::resolver::ProxyChainResolver;
use crate::proxy::transport::{HttpTransport, Transport};

/// Query keys the gateway owns. Caller params with these names are dropped.
const RESERVED_KEYS: [&str; 2] = ["resource", "action"];

/// One logical backend call.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub resource: String,
    pub action: String,
    pub body: Option<Value>,
    pub params: QueryParams,
    /// Overrides the method inferred from the body.
    pub method: Option<Method>,
}

impl ApiRequest {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// `resource` and `action` go first, followed by the caller's params.
    pub fn into_build_options(self) -> BuildOptions {
        let mut caller = self.params;
        for key in RESERVED_KEYS {
            if caller.remove_key(key) > 0 {
                debug!(key, "dropping caller param that collides with a reserved key");
            }
        }

        let mut params = QueryParams::new()
            .with("resource", self.resource)
            .with("action", self.action);
        for (k, v) in caller.iter() {
            params.push(k, v);
        }

        BuildOptions {
            method: self.method,
            body: self.body,
            params,
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(&self, request: ApiRequest) -> ApiEnvelope;

    /// `apiCall(resource, action, body, params)`.
    async fn api_call(&self, resource: &str, action: &str, body: Value, params: QueryParams) -> ApiEnvelope {
        self.call(
            ApiRequest::new(resource, action)
                .with_body(body)
                .with_params(params),
        )
        .await
    }
}

/// Run one call inside its own span, turning errors and panics into a failed
/// envelope.
async fn guarded<F>(resource: &str, action: &str, fut: F) -> ApiEnvelope
where
    F: Future<Output = Result<Value, GatewayError>>,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("api_call", %request_id, resource, action);

    async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(payload)) => ApiEnvelope::from_backend(payload),
            Ok(Err(e)) => {
                warn!(error = %e, "api call failed");
                ApiEnvelope::failure(e.to_string())
            }
            Err(_) => {
                error!("api call panicked");
                ApiEnvelope::failure("internal gateway error")
            }
        }
    }
    .instrument(span)
    .await
}

/// Reaches the backend through the relay chain.
#[derive(Clone)]
pub struct RelayGateway {
    backend_url: String,
    resolver: ProxyChainResolver,
}

impl RelayGateway {
    pub fn new(backend_url: impl Into<String>, resolver: ProxyChainResolver) -> Self {
        Self {
            backend_url: backend_url.into(),
            resolver,
        }
    }
}

#[async_trait]
impl Gateway for RelayGateway {
    async fn call(&self, request: ApiRequest) -> ApiEnvelope {
        let (resource, action) = (request.resource.clone(), request.action.clone());
        guarded(&resource, &action, async move {
            let spec = build_request(&self.backend_url, request.into_build_options())?;
            let resolved = self.resolver.resolve(&spec).await?;
            info!(source = ?resolved.source, "api call resolved");
            Ok(resolved.payload)
        })
        .await
    }
}

/// Calls the backend without relays, for deployments where cross-origin
/// restrictions do not apply.
#[derive(Clone)]
pub struct DirectGateway {
    backend_url: String,
    transport: DirectFallbackTransport,
}

impl DirectGateway {
    pub fn new(backend_url: impl Into<String>, transport: DirectFallbackTransport) -> Self {
        Self {
            backend_url: backend_url.into(),
            transport,
        }
    }
}

#[async_trait]
impl Gateway for DirectGateway {
    async fn call(&self, request: ApiRequest) -> ApiEnvelope {
        let (resource, action) = (request.resource.clone(), request.action.clone());
        guarded(&resource, &action, async move {
            let spec = build_request(&self.backend_url, request.into_build_options())?;
            self.transport
                .send(&spec)
                .await
                .map_err(GatewayError::DirectFailed)
        })
        .await
    }
}

/// Assemble the gateway described by `cfg`.
pub fn from_config(cfg: &Config) -> anyhow::Result<Arc<dyn Gateway>> {
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(cfg.attempt_timeout).context("failed to build HTTP client")?,
    );
    let direct = DirectFallbackTransport::new(transport.clone(), cfg.attempt_timeout);

    let gateway: Arc<dyn Gateway> = match cfg.mode {
        GatewayMode::Relay => {
            let registry = load_registry(cfg)?;
            let mut resolver = ProxyChainResolver::new(registry, transport, cfg.attempt_timeout);
            if cfg.direct_fallback {
                resolver = resolver.with_direct_fallback(direct);
            }
            with_cache(cfg, RelayGateway::new(cfg.backend_url.clone(), resolver))
        }
        GatewayMode::Direct => with_cache(cfg, DirectGateway::new(cfg.backend_url.clone(), direct)),
    };
    Ok(gateway)
}

pub fn load_registry(cfg: &Config) -> anyhow::Result<ProxyRegistry> {
    registry_from(cfg.proxy_file.as_deref())
}

/// The relay list in `proxy_file`, or the built-in one.
pub fn registry_from(proxy_file: Option<&Path>) -> anyhow::Result<ProxyRegistry> {
    match proxy_file {
        Some(path) => ProxyRegistry::from_yaml_file(path),
        None => Ok(ProxyRegistry::default()),
    }
}

fn with_cache<G: Gateway + 'static>(cfg: &Config, gateway: G) -> Arc<dyn Gateway> {
    if cfg.cache_ttl.is_zero() {
        Arc::new(gateway)
    } else {
        Arc::new(CachingGateway::new(gateway, ResourceCache::new(cfg.cache_ttl)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_keys_win_over_caller_params() {
        let opts = ApiRequest::new("students", "list")
            .with_params(
                QueryParams::new()
                    .with("action", "delete")
                    .with("status", "active")
                    .with("resource", "payments"),
            )
            .into_build_options();
        let pairs: Vec<_> = opts.params.iter().collect();
        assert_eq!(
            pairs,
            vec![("resource", "students"), ("action", "list"), ("status", "active")]
        );
    }

    #[test]
    fn test_api_request_keeps_body_and_method() {
        let opts = ApiRequest::new("payments", "mark_paid")
            .with_body(json!({"payment_ids": ["p1"]}))
            .with_method(Method::POST)
            .into_build_options();
        assert_eq!(opts.method, Some(Method::POST));
        assert_eq!(opts.body, Some(json!({"payment_ids": ["p1"]})));
    }

    #[tokio::test]
    async fn test_invalid_backend_url_becomes_failed_envelope() {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::with_client(reqwest::Client::new()));
        let direct = DirectFallbackTransport::new(transport, std::time::Duration::from_secs(1));
        let gateway = DirectGateway::new("::not-a-url::", direct);

        let env = gateway
            .api_call("students", "list", json!({}), QueryParams::new())
            .await;
        assert!(!env.is_ok());
        assert!(env.error().unwrap().starts_with("invalid request"));
        assert!(env.data().is_none());
    }

    struct PanickingGateway;

    #[async_trait]
    impl Gateway for PanickingGateway {
        async fn call(&self, request: ApiRequest) -> ApiEnvelope {
            guarded(&request.resource, &request.action, async {
                if request.resource == "events" {
                    panic!("boom");
                }
                Ok::<_, GatewayError>(Value::Null)
            })
            .await
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let env = PanickingGateway
            .call(ApiRequest::new("events", "list"))
            .await;
        assert_eq!(env, ApiEnvelope::failure("internal gateway error"));
    }
}
