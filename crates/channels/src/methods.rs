use std::{collections::HashMap, future::Future, pin::Pin};

use {
    async_trait::async_trait,
    serde_json::Value,
    tracing::{debug, warn},
    xnft_protocol::{CorrelationId, ErrorShape, InboundMessage, RpcResponse, error_codes},
};

use crate::handler::RequestHandler;

// ── Types ────────────────────────────────────────────────────────────────────

/// Context passed to every method handler.
#[derive(Debug, Clone)]
pub struct MethodContext {
    pub id: CorrelationId,
    pub method: String,
    /// `detail.params`, or `null` when absent.
    pub params: Value,
    pub origin: String,
}

/// The result a method handler produces.
pub type MethodResult = Result<Value, ErrorShape>;

/// A boxed async method handler.
pub type MethodFn =
    Box<dyn Fn(MethodContext) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

// ── Method registry ──────────────────────────────────────────────────────────

/// Routes requests by `detail.method` to named handlers.
///
/// Every outcome lands in the response pair: handler errors and routing
/// failures become the `error` half, never an `Err`.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, MethodFn>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `method`, replacing any previous one.
    pub fn register(&mut self, method: impl Into<String>, handler: MethodFn) {
        self.handlers.insert(method.into(), handler);
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn dispatch(&self, message: &InboundMessage) -> RpcResponse {
        let Some(method) = message.method() else {
            warn!(id = %message.id, "request without method");
            return RpcResponse::err(ErrorShape::new(
                error_codes::INVALID_REQUEST,
                "detail.method must be a string",
            ));
        };

        let Some(handler) = self.handlers.get(method) else {
            warn!(method, id = %message.id, "unknown method");
            return RpcResponse::err(ErrorShape::new(
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {method}"),
            ));
        };

        let ctx = MethodContext {
            id: message.id.clone(),
            method: method.to_owned(),
            params: message.params().cloned().unwrap_or(Value::Null),
            origin: message.origin.clone(),
        };

        debug!(method, id = %message.id, "dispatching method");
        match handler(ctx).await {
            Ok(payload) => {
                debug!(method, id = %message.id, "method ok");
                RpcResponse::ok(payload)
            },
            Err(err) => {
                warn!(method, id = %message.id, code = %err.code, msg = %err.message, "method error");
                RpcResponse::err(err)
            },
        }
    }
}

#[async_trait]
impl RequestHandler for MethodRegistry {
    async fn handle(&self, message: &InboundMessage) -> anyhow::Result<RpcResponse> {
        Ok(self.dispatch(message).await)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {rstest::rstest, serde_json::json};

    use super::*;

    fn registry() -> MethodRegistry {
        let mut reg = MethodRegistry::new();
        reg.register("ping", Box::new(|_ctx| Box::pin(async { Ok(json!("pong")) })));
        reg.register(
            "echo",
            Box::new(|ctx| Box::pin(async move { Ok(ctx.params) })),
        );
        reg.register(
            "wallet.sign",
            Box::new(|_ctx| {
                Box::pin(async {
                    Err(ErrorShape::new("LOCKED", "wallet is locked")
                        .with_details(json!({ "retry": false })))
                })
            }),
        );
        reg
    }

    fn message(detail: Value) -> InboundMessage {
        let data = json!({
            "href": "https://plugin.example/app",
            "type": "plugin-request",
            "detail": detail,
        });
        xnft_protocol::RequestEnvelope::parse(&data)
            .unwrap()
            .into_message("https://plugin.example")
            .unwrap()
    }

    #[tokio::test]
    async fn routes_to_registered_method() {
        let reply = registry()
            .dispatch(&message(json!({ "id": 1, "method": "ping" })))
            .await;
        assert_eq!(reply, RpcResponse::ok(json!("pong")));
    }

    #[tokio::test]
    async fn params_default_to_null() {
        let reg = registry();
        let reply = reg
            .dispatch(&message(json!({ "id": 1, "method": "echo" })))
            .await;
        assert_eq!(reply, RpcResponse::ok(Value::Null));

        let reply = reg
            .dispatch(&message(json!({ "id": 1, "method": "echo", "params": [1, 2] })))
            .await;
        assert_eq!(reply, RpcResponse::ok(json!([1, 2])));
    }

    #[tokio::test]
    async fn handler_error_lands_in_error_half() {
        let reply = registry()
            .dispatch(&message(json!({ "id": 1, "method": "wallet.sign" })))
            .await;
        assert!(reply.result.is_none());
        assert_eq!(
            reply.error,
            Some(json!({ "code": "LOCKED", "message": "wallet is locked", "details": { "retry": false } }))
        );
    }

    #[rstest]
    #[case(json!({ "id": 1 }), error_codes::INVALID_REQUEST)]
    #[case(json!({ "id": 1, "method": 7 }), error_codes::INVALID_REQUEST)]
    #[case(json!({ "id": 1, "method": "nope" }), error_codes::METHOD_NOT_FOUND)]
    #[tokio::test]
    async fn routing_failures_are_error_pairs(#[case] detail: Value, #[case] code: &str) {
        let reply = registry().dispatch(&message(detail)).await;
        assert_eq!(reply.error.unwrap()["code"], code);
    }

    #[tokio::test]
    async fn handle_never_fails() {
        let reply = registry()
            .handle(&message(json!({ "id": "x", "method": "nope" })))
            .await
            .unwrap();
        assert!(reply.is_err());
    }

    #[test]
    fn method_names_are_sorted() {
        assert_eq!(registry().method_names(), ["echo", "ping", "wallet.sign"]);
        assert!(registry().contains("ping"));
    }
}
