use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::errors::AttemptError;
use crate::proxy::registry::Extractor;
use crate::proxy::request::RequestSpec;
use crate::proxy::resolver::attempt;
use crate::proxy::transport::Transport;

/// One relay-free request to the backend.
///
/// Used as the resolver's final step once every relay has failed: its error
/// is what the caller ends up seeing. It is also the primary transport in
/// direct mode, where no relay is needed.
#[derive(Clone)]
pub struct DirectFallbackTransport {
    transport: Arc<dyn Transport>,
    attempt_timeout: Duration,
}

impl DirectFallbackTransport {
    pub fn new(transport: Arc<dyn Transport>, attempt_timeout: Duration) -> Self {
        Self {
            transport,
            attempt_timeout,
        }
    }

    pub async fn send(&self, spec: &RequestSpec) -> Result<Value, AttemptError> {
        let result = attempt(
            self.transport.as_ref(),
            &spec.target_url,
            spec,
            self.attempt_timeout,
            Extractor::PassThrough,
        )
        .await;

        if let Err(e) = &result {
            tracing::warn!(proxy = "direct", kind = e.kind(), reason = %e, "direct backend request failed");
        }
        result
    }
}
