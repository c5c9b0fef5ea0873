use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    serde_json::Value,
    tokio::sync::{Mutex, oneshot},
    tracing::{debug, warn},
    xnft_config::XnftConfig,
    xnft_protocol::{
        DEFAULT_REQUEST_TIMEOUT_MS, MessageEvent, RequestFrame, ResponseDetail, ResponseFrame,
        RpcResponse, TargetOrigin,
    },
};

#[cfg(feature = "metrics")]
use xnft_metrics::{client as client_metrics, counter, gauge, labels};

use crate::{
    Error, Result,
    source::{EventSource, ListenerFuture, MessageListener, Subscription},
    target::MessageTarget,
};

type PendingMap = HashMap<String, oneshot::Sender<ResponseDetail>>;

/// Plugin side of a channel: posts requests to the host and correlates the
/// replies by id.
///
/// The protocol leaves timeouts to the caller; every [`PluginClient::call`]
/// gives up after the configured timeout.
#[derive(Clone)]
pub struct PluginClient {
    href: String,
    request_channel: String,
    response_channel: String,
    host: Arc<dyn MessageTarget>,
    target_origin: TargetOrigin,
    host_origin: Option<String>,
    timeout: Duration,
    pending: Arc<Mutex<PendingMap>>,
}

impl PluginClient {
    /// `href` is the plugin's own URL as the host was configured with it.
    pub fn new(
        href: impl Into<String>,
        request_channel: impl Into<String>,
        response_channel: impl Into<String>,
        host: Arc<dyn MessageTarget>,
    ) -> Self {
        Self {
            href: href.into(),
            request_channel: request_channel.into(),
            response_channel: response_channel.into(),
            host,
            target_origin: TargetOrigin::Any,
            host_origin: None,
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a client mirroring a host-side config file.
    ///
    /// The channel must have a response channel; calls would never resolve
    /// otherwise.
    pub fn from_config(host: Arc<dyn MessageTarget>, config: &XnftConfig) -> Result<Self> {
        let Some(response_channel) = config.channel.response_channel.clone() else {
            return Err(Error::invalid_input(
                "plugin client needs channel.response_channel",
            ));
        };
        let mut client = Self::new(
            config.channel.target_url.clone(),
            config.channel.request_channel.clone(),
            response_channel,
            host,
        )
        .with_timeout(config.client.request_timeout());
        if let Some(origin) = &config.client.host_origin {
            client = client
                .with_target_origin(TargetOrigin::exact(origin.clone()))
                .with_host_origin(origin.clone());
        }
        Ok(client)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target origin requests are posted with (default `*`).
    #[must_use]
    pub fn with_target_origin(mut self, target_origin: TargetOrigin) -> Self {
        self.target_origin = target_origin;
        self
    }

    /// Only accept responses from events with this origin.
    #[must_use]
    pub fn with_host_origin(mut self, origin: impl Into<String>) -> Self {
        self.host_origin = Some(origin.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait for the correlated response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<RpcResponse> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = RequestFrame::call(
            &self.href,
            &self.request_channel,
            id.as_str(),
            method,
            params,
        );

        let (tx, rx) = oneshot::channel();
        self.track(|pending| {
            pending.insert(id.clone(), tx);
        })
        .await;

        #[cfg(feature = "metrics")]
        counter!(client_metrics::CALLS_TOTAL, labels::METHOD => method.to_owned()).increment(1);

        if let Err(e) = self.post(frame) {
            self.forget(&id).await;
            return Err(e);
        }
        debug!(method, id = %id, "plugin client: request posted");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(detail)) => Ok(detail.into()),
            Ok(Err(_)) => {
                self.forget(&id).await;
                Err(Error::Cancelled {
                    method: method.to_owned(),
                })
            },
            Err(_) => {
                self.forget(&id).await;
                warn!(method, id = %id, timeout_ms = self.timeout.as_millis() as u64, "plugin client: call timed out");
                #[cfg(feature = "metrics")]
                counter!(client_metrics::TIMEOUTS_TOTAL, labels::METHOD => method.to_owned())
                    .increment(1);
                Err(Error::Timeout {
                    method: method.to_owned(),
                    after_ms: self.timeout.as_millis() as u64,
                })
            },
        }
    }

    /// Send a request without waiting for a response.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        self.post(RequestFrame::call(
            &self.href,
            &self.request_channel,
            id,
            method,
            params,
        ))
    }

    /// Route a response event to the waiting [`PluginClient::call`].
    ///
    /// Returns `false` for events that are not a response to a pending call:
    /// other origins, other channels, malformed frames and unknown or
    /// already timed out ids.
    pub async fn resolve(&self, event: &MessageEvent) -> bool {
        if let Some(expected) = &self.host_origin
            && event.origin != *expected
        {
            return false;
        }
        let frame: ResponseFrame = match serde_json::from_value(event.data.clone()) {
            Ok(frame) => frame,
            Err(_) => return false,
        };
        if frame.channel != self.response_channel {
            return false;
        }
        let Some(id) = frame.detail.id.as_str().map(str::to_owned) else {
            debug!(id = %frame.detail.id, "plugin client: response id is not one of ours");
            return false;
        };

        let mut resolved = None;
        self.track(|pending| resolved = pending.remove(&id)).await;
        match resolved {
            Some(tx) => {
                // The caller may have given up in the meantime.
                let _ = tx.send(frame.detail);
                true
            },
            None => {
                debug!(id = %id, "plugin client: response for unknown call");
                false
            },
        }
    }

    /// Attach [`PluginClient::resolve`] to an event source, typically the
    /// plugin's own window.
    pub fn listen(&self, source: &dyn EventSource) -> Subscription {
        let client = self.clone();
        let listener: MessageListener = Arc::new(move |event: MessageEvent| {
            let client = client.clone();
            Box::pin(async move {
                client.resolve(&event).await;
                Ok(())
            }) as ListenerFuture
        });
        source.subscribe(listener)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Fail every in-flight call with [`Error::Cancelled`].
    pub async fn cancel_all(&self) {
        self.track(HashMap::clear).await;
    }

    fn post(&self, frame: RequestFrame) -> Result<()> {
        self.host
            .post_message(serde_json::to_value(frame)?, &self.target_origin)
    }

    async fn forget(&self, id: &str) {
        self.track(|pending| {
            pending.remove(id);
        })
        .await;
    }

    /// Mutate the pending map and publish its size.
    async fn track(&self, f: impl FnOnce(&mut PendingMap)) {
        let mut pending = self.pending.lock().await;
        f(&mut pending);
        #[cfg(feature = "metrics")]
        gauge!(client_metrics::PENDING).set(pending.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use serde_json::json;

    use {super::*, crate::target::Mailbox};

    const HREF: &str = "https://plugin.example/app";

    fn client() -> (PluginClient, tokio::sync::mpsc::UnboundedReceiver<crate::PostedMessage>) {
        let (mailbox, rx) = Mailbox::new();
        let client = PluginClient::new(HREF, "plugin-request", "plugin-response", Arc::new(mailbox))
            .with_host_origin("https://wallet.example");
        (client, rx)
    }

    fn response(id: &str, result: Value) -> MessageEvent {
        MessageEvent::new(
            "https://wallet.example",
            json!({ "type": "plugin-response", "detail": { "id": id, "result": result } }),
        )
    }

    #[tokio::test]
    async fn call_posts_request_and_resolves() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("ping", None).await })
        };

        let posted = rx.recv().await.unwrap();
        assert_eq!(posted.target_origin, TargetOrigin::Any);
        assert_eq!(posted.message["href"], HREF);
        assert_eq!(posted.message["type"], "plugin-request");
        assert_eq!(posted.message["detail"]["method"], "ping");
        assert!(posted.message["detail"].get("params").is_none());
        let id = posted.message["detail"]["id"].as_str().unwrap().to_owned();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        assert!(client.resolve(&response(&id, json!("pong"))).await);
        let reply = caller.await.unwrap().unwrap();
        assert_eq!(reply, RpcResponse::ok(json!("pong")));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        let (client, _rx) = client();
        let client = client.with_timeout(Duration::from_millis(20));
        let err = client.call("slow", Some(json!([]))).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref method, after_ms: 20 } if method == "slow"));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn late_response_is_not_resolved() {
        let (client, mut rx) = client();
        let client = client.with_timeout(Duration::from_millis(20));
        let _ = client.call("slow", None).await;
        let id = rx.try_recv().unwrap().message["detail"]["id"]
            .as_str()
            .unwrap()
            .to_owned();
        assert!(!client.resolve(&response(&id, json!(1))).await);
    }

    #[tokio::test]
    async fn resolve_ignores_foreign_traffic() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("ping", None).await })
        };
        let id = rx.recv().await.unwrap().message["detail"]["id"]
            .as_str()
            .unwrap()
            .to_owned();

        let wrong_origin = MessageEvent::new(
            "https://evil.example",
            json!({ "type": "plugin-response", "detail": { "id": id } }),
        );
        let wrong_channel = MessageEvent::new(
            "https://wallet.example",
            json!({ "type": "plugin-request", "detail": { "id": id } }),
        );
        let malformed = MessageEvent::new("https://wallet.example", json!("pong"));
        for event in [wrong_origin, wrong_channel, malformed] {
            assert!(!client.resolve(&event).await);
        }
        assert!(!client.resolve(&response("unknown", json!(1))).await);
        assert_eq!(client.pending_count().await, 1);

        client.cancel_all().await;
        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[tokio::test]
    async fn notify_does_not_track() {
        let (client, mut rx) = client();
        client.notify("log", Some(json!({ "level": "info" }))).unwrap();
        let posted = rx.try_recv().unwrap();
        assert_eq!(posted.message["detail"]["params"], json!({ "level": "info" }));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn failed_post_cleans_up() {
        let (client, rx) = client();
        drop(rx);
        let err = client.call("ping", None).await.unwrap_err();
        assert!(matches!(err, Error::Post { .. }));
        assert_eq!(client.pending_count().await, 0);
    }

    #[test]
    fn from_config_requires_response_channel() {
        let (mailbox, _rx) = Mailbox::new();
        let mut config = XnftConfig::default();
        config.channel.target_url = HREF.into();
        config.channel.request_channel = "plugin-request".into();
        assert!(matches!(
            PluginClient::from_config(Arc::new(mailbox.clone()), &config),
            Err(Error::InvalidInput { .. })
        ));

        config.channel.response_channel = Some("plugin-response".into());
        config.client.host_origin = Some("https://wallet.example".into());
        config.client.request_timeout_ms = 500;
        let client = PluginClient::from_config(Arc::new(mailbox), &config).unwrap();
        assert_eq!(client.timeout(), Duration::from_millis(500));
        assert_eq!(client.target_origin, TargetOrigin::exact("https://wallet.example"));
    }
}
