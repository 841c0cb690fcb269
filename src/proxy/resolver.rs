use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{AttemptError, GatewayError};
use crate::proxy::direct::DirectFallbackTransport;
use crate::proxy::registry::{Extractor, ProxyRegistry};
use crate::proxy::request::RequestSpec;
use crate::proxy::transport::Transport;

/// Which transport produced a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Relay(String),
    Direct,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub payload: Value,
    pub source: Source,
}

/// Run a single attempt under a deadline and classify the result.
pub(crate) async fn attempt(
    transport: &dyn Transport,
    url: &str,
    spec: &RequestSpec,
    deadline: Duration,
    extractor: Extractor,
) -> Result<Value, AttemptError> {
    let raw = tokio::time::timeout(deadline, transport.send(url, spec))
        .await
        .map_err(|_| AttemptError::Timeout(deadline))??;
    extractor.extract(raw.classify()?)
}

/// Walks the registry strictly in order; the first well-formed payload wins.
///
/// Attempts are never raced: each one finishes (or hits its deadline) before
/// the next starts, so a non-idempotent backend action is sent at most once
/// per successful relay.
#[derive(Clone)]
pub struct ProxyChainResolver {
    registry: ProxyRegistry,
    transport: Arc<dyn Transport>,
    attempt_timeout: Duration,
    direct: Option<DirectFallbackTransport>,
}

impl ProxyChainResolver {
    pub fn new(registry: ProxyRegistry, transport: Arc<dyn Transport>, attempt_timeout: Duration) -> Self {
        Self {
            registry,
            transport,
            attempt_timeout,
            direct: None,
        }
    }

    pub fn with_direct_fallback(mut self, direct: DirectFallbackTransport) -> Self {
        self.direct = Some(direct);
        self
    }

    pub fn registry(&self) -> &ProxyRegistry {
        &self.registry
    }

    pub async fn resolve(&self, spec: &RequestSpec) -> Result<Resolved, GatewayError> {
        for (index, proxy) in self.registry.iter().enumerate() {
            let url = proxy.relay_url(&spec.target_url);
            debug!(proxy = %proxy.name, index, method = %spec.method, "trying relay");

            match attempt(self.transport.as_ref(), &url, spec, self.attempt_timeout, proxy.extract).await {
                Ok(payload) => {
                    debug!(proxy = %proxy.name, index, "relay succeeded");
                    return Ok(Resolved {
                        payload,
                        source: Source::Relay(proxy.name.clone()),
                    });
                }
                Err(e) => {
                    warn!(proxy = %proxy.name, index, kind = e.kind(), reason = %e, "relay attempt failed");
                }
            }
        }

        let attempted = self.registry.len();
        let Some(direct) = &self.direct else {
            return Err(GatewayError::AllProxiesExhausted { attempted });
        };

        warn!(attempted, "all relays failed, trying backend directly");
        match direct.send(spec).await {
            Ok(payload) => Ok(Resolved {
                payload,
                source: Source::Direct,
            }),
            Err(direct) => Err(GatewayError::BackendUnreachable { attempted, direct }),
        }
    }
}
