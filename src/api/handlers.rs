use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use bytes::Bytes;
use serde_json::Value;

use super::AppState;
use crate::envelope::ApiEnvelope;
use crate::gateway::{ApiRequest, Gateway};
use crate::proxy::registry::ProxyDescriptor;
use crate::proxy::request::QueryParams;

/// `GET|POST /api/:resource/:action`
///
/// Always answers 200; success or failure is carried by the envelope.
/// A body that is not JSON fails the call before the backend is reached.
pub async fn call_backend(
    State(state): State<Arc<AppState>>,
    Path((resource, action)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ApiEnvelope> {
    let params = query.as_deref().map(QueryParams::from_query).unwrap_or_default();

    let body = match parse_body(&headers, &body) {
        Ok(body) => body,
        Err(reason) => {
            tracing::warn!(%resource, %action, %reason, "rejected bridge request body");
            return Json(ApiEnvelope::failure(reason));
        }
    };

    let mut request = ApiRequest::new(resource, action).with_params(params);
    if let Some(body) = body {
        request = request.with_body(body);
    }

    Json(state.gateway.call(request).await)
}

/// An empty body means "no body". Anything else must be labelled and parse
/// as JSON.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Option<Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if !(mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")) {
        return Err("invalid request body: expected content-type application/json".to_string());
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| format!("invalid request body: {}", e))
}

/// `GET /api/proxies`
pub async fn list_proxies(State(state): State<Arc<AppState>>) -> Json<Vec<ProxyDescriptor>> {
    Json(state.registry.iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bridge_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    /// Echoes the request it received as the envelope's data.
    struct EchoGateway;

    #[async_trait]
    impl Gateway for EchoGateway {
        async fn call(&self, request: ApiRequest) -> ApiEnvelope {
            let params: Vec<Value> = request
                .params
                .iter()
                .map(|(k, v)| json!([k, v]))
                .collect();
            ApiEnvelope::success(Some(json!({
                "resource": request.resource,
                "action": request.action,
                "body": request.body,
                "params": params,
            })))
        }
    }

    fn router() -> axum::Router {
        let state = Arc::new(AppState {
            gateway: Arc::new(EchoGateway),
            registry: crate::proxy::registry::ProxyRegistry::default(),
        });
        bridge_router(state, "http://localhost:3000")
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_forwards_repeated_query_params() {
        let resp = router()
            .oneshot(
                Request::get("/api/payments/list?status=paid&status=overdue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["resource"], "payments");
        assert_eq!(body["data"]["action"], "list");
        assert_eq!(body["data"]["params"], json!([["status", "paid"], ["status", "overdue"]]));
        assert_eq!(body["data"]["body"], Value::Null);
    }

    #[tokio::test]
    async fn test_post_forwards_json_body() {
        let resp = router()
            .oneshot(
                Request::post("/api/attendance/save_group")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"group_name":"A","students":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(resp).await;
        assert_eq!(body["data"]["body"], json!({"group_name": "A", "students": []}));
    }

    /// Refuses every call so tests can prove the backend was never reached.
    struct UnreachableGateway;

    #[async_trait]
    impl Gateway for UnreachableGateway {
        async fn call(&self, _request: ApiRequest) -> ApiEnvelope {
            panic!("gateway must not be called");
        }
    }

    fn unreachable_router() -> axum::Router {
        let state = Arc::new(AppState {
            gateway: Arc::new(UnreachableGateway),
            registry: crate::proxy::registry::ProxyRegistry::default(),
        });
        bridge_router(state, "http://localhost:3000")
    }

    #[tokio::test]
    async fn test_unlabelled_body_is_rejected() {
        let resp = unreachable_router()
            .oneshot(
                Request::post("/api/students/create")
                    .body(Body::from(r#"{"name":"Ann"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body.get("data").is_none());
        assert!(body["error"].as_str().unwrap().contains("content-type"));
    }

    #[tokio::test]
    async fn test_malformed_json_body_is_rejected() {
        let resp = unreachable_router()
            .oneshot(
                Request::post("/api/students/create")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_empty_post_has_no_body() {
        let resp = router()
            .oneshot(Request::post("/api/dashboard/summary").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["body"], Value::Null);
    }

    #[tokio::test]
    async fn test_lists_proxies_in_order() {
        let resp = router()
            .oneshot(Request::get("/api/proxies").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body[0]["name"], "corsproxy.io");
        assert_eq!(body[2]["extract"], "contents");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let resp = router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
