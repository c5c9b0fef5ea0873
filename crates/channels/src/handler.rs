use std::future::Future;

use {
    async_trait::async_trait,
    xnft_protocol::{InboundMessage, RpcResponse},
};

/// Application logic behind a plugin channel.
///
/// Failures the caller should see belong in the `error` half of the returned
/// [`RpcResponse`]. Returning `Err` aborts the request: the error propagates
/// to whoever drives event delivery and no response is posted.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> anyhow::Result<RpcResponse>;
}

/// [`RequestHandler`] built from an async closure; see [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap an async closure taking an owned [`InboundMessage`].
///
/// ```rust,ignore
/// channel.register(handler_fn(|msg| async move {
///     Ok(RpcResponse::ok(json!({ "echo": msg.params() })))
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<RpcResponse>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<RpcResponse>> + Send,
{
    async fn handle(&self, message: &InboundMessage) -> anyhow::Result<RpcResponse> {
        (self.0)(message.clone()).await
    }
}
