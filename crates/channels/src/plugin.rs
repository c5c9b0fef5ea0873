use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use {
    tracing::{debug, error, info, warn},
    xnft_config::ChannelConfig,
    xnft_protocol::{MalformedMessage, MessageEvent, ResponseFrame},
};

#[cfg(feature = "metrics")]
use xnft_metrics::{channel as ch_metrics, counter, histogram, labels};

use crate::{
    Error, Result,
    binding::ChannelBinding,
    gating::{self, FilterReason, Verdict},
    handler::RequestHandler,
    source::{EventSource, ListenerFuture, MessageListener, Subscription},
    target::MessageTarget,
};

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Failed the origin/href/channel allow-list; ignored.
    Filtered(FilterReason),
    /// From the target origin but not shaped like a request; ignored.
    Malformed(MalformedMessage),
    /// The handler ran. `responded` is false on fire-and-forget channels.
    Handled { responded: bool },
}

/// Destination window state. Responses can only be posted once `Ready`.
#[derive(Clone, Default)]
enum Destination {
    #[default]
    Created,
    Ready(Arc<dyn MessageTarget>),
}

/// Host end of a plugin channel.
///
/// Cloning is cheap; clones share the binding and the destination window.
#[derive(Clone)]
pub struct PluginChannel {
    shared: Arc<Shared>,
    source: Arc<dyn EventSource>,
}

struct Shared {
    binding: ChannelBinding,
    destination: RwLock<Destination>,
}

impl PluginChannel {
    /// Bind a channel on `source` for the plugin served at `target_url`.
    ///
    /// Without a `response_channel` requests are handled but never answered.
    pub fn new(
        source: Arc<dyn EventSource>,
        target_url: &str,
        request_channel: impl Into<String>,
        response_channel: Option<String>,
    ) -> Result<Self> {
        let binding = ChannelBinding::new(target_url, request_channel, response_channel)?;
        Ok(Self::with_binding(source, binding))
    }

    pub fn with_binding(source: Arc<dyn EventSource>, binding: ChannelBinding) -> Self {
        Self {
            shared: Arc::new(Shared {
                binding,
                destination: RwLock::new(Destination::Created),
            }),
            source,
        }
    }

    pub fn from_config(source: Arc<dyn EventSource>, config: &ChannelConfig) -> Result<Self> {
        let binding = ChannelBinding::new(
            &config.target_url,
            config.request_channel.clone(),
            config.response_channel.clone(),
        )?
        .with_response_origin(config.response_origin);
        Ok(Self::with_binding(source, binding))
    }

    pub fn binding(&self) -> &ChannelBinding {
        &self.shared.binding
    }

    /// Bind the window responses are posted to. The last call wins.
    pub fn set_destination_window(&self, window: Arc<dyn MessageTarget>) {
        let mut dest = self
            .shared
            .destination
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let replaced = matches!(*dest, Destination::Ready(_));
        *dest = Destination::Ready(window);
        let channel = self.shared.binding.request_channel();
        if replaced {
            debug!(channel, "plugin channel: destination window replaced");
        } else {
            info!(channel, "plugin channel: destination window bound");
        }
    }

    /// Whether a destination window has been bound.
    pub fn is_ready(&self) -> bool {
        matches!(
            *self
                .shared
                .destination
                .read()
                .unwrap_or_else(|e| e.into_inner()),
            Destination::Ready(_)
        )
    }

    /// Start handling requests from the event source.
    ///
    /// Every delivered event runs [`PluginChannel::handle_event`]
    /// independently; the listener's error (handler failure, missing
    /// destination) is returned to whatever drives delivery.
    pub fn register<H>(&self, handler: H) -> Subscription
    where
        H: RequestHandler + 'static,
    {
        let handler: Arc<dyn RequestHandler> = Arc::new(handler);
        let shared = Arc::clone(&self.shared);
        let listener: MessageListener = Arc::new(move |event: MessageEvent| {
            let shared = Arc::clone(&shared);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                shared
                    .handle_event(event, handler.as_ref())
                    .await
                    .map(|_| ())
            }) as ListenerFuture
        });

        let subscription = self.source.subscribe(listener);
        let binding = &self.shared.binding;
        info!(
            target_url = %binding.target_href(),
            request_channel = binding.request_channel(),
            response_channel = ?binding.response_channel(),
            subscription = subscription.id(),
            "plugin channel: registered"
        );
        subscription
    }

    /// Run one event through the filter, the handler and the response path.
    pub async fn handle_event(
        &self,
        event: MessageEvent,
        handler: &dyn RequestHandler,
    ) -> Result<DispatchOutcome> {
        self.shared.handle_event(event, handler).await
    }
}

impl Shared {
    async fn handle_event(
        &self,
        event: MessageEvent,
        handler: &dyn RequestHandler,
    ) -> Result<DispatchOutcome> {
        let channel = self.binding.request_channel();
        #[cfg(feature = "metrics")]
        counter!(ch_metrics::EVENTS_TOTAL, labels::CHANNEL => channel.to_owned()).increment(1);

        let message = match gating::inspect(&self.binding, &event) {
            Verdict::Accept(message) => message,
            Verdict::Filtered(reason) => {
                debug!(channel, origin = %event.origin, %reason, "plugin channel: message filtered");
                #[cfg(feature = "metrics")]
                counter!(
                    ch_metrics::FILTERED_TOTAL,
                    labels::CHANNEL => channel.to_owned(),
                    labels::REASON => reason.as_str()
                )
                .increment(1);
                return Ok(DispatchOutcome::Filtered(reason));
            },
            Verdict::Malformed(reason) => {
                debug!(channel, origin = %event.origin, error = %reason, "plugin channel: malformed message");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::MALFORMED_TOTAL, labels::CHANNEL => channel.to_owned())
                    .increment(1);
                return Ok(DispatchOutcome::Malformed(reason));
            },
        };

        let id = message.id.clone();
        debug!(channel, id = %id, method = ?message.method(), "plugin channel: dispatching request");
        #[cfg(feature = "metrics")]
        counter!(ch_metrics::REQUESTS_TOTAL, labels::CHANNEL => channel.to_owned()).increment(1);

        let started = Instant::now();
        let reply = handler.handle(&message).await.map_err(|e| {
            warn!(channel, id = %id, error = %e, "plugin channel: handler failed");
            #[cfg(feature = "metrics")]
            counter!(ch_metrics::HANDLER_ERRORS_TOTAL, labels::CHANNEL => channel.to_owned())
                .increment(1);
            Error::handler(e)
        })?;
        let elapsed = started.elapsed();
        #[cfg(feature = "metrics")]
        histogram!(ch_metrics::HANDLER_DURATION_SECONDS, labels::CHANNEL => channel.to_owned())
            .record(elapsed.as_secs_f64());

        let Some(response_channel) = self.binding.response_channel() else {
            debug!(channel, id = %id, elapsed_ms = elapsed.as_millis() as u64, "plugin channel: handled without response");
            return Ok(DispatchOutcome::Handled { responded: false });
        };

        let frame = ResponseFrame::new(response_channel, id, reply);
        self.post_response(frame).inspect_err(|_e| {
            #[cfg(feature = "metrics")]
            counter!(ch_metrics::RESPONSE_FAILURES_TOTAL, labels::CHANNEL => channel.to_owned())
                .increment(1);
        })?;
        #[cfg(feature = "metrics")]
        counter!(ch_metrics::RESPONSES_POSTED_TOTAL, labels::CHANNEL => channel.to_owned())
            .increment(1);
        Ok(DispatchOutcome::Handled { responded: true })
    }

    fn post_response(&self, frame: ResponseFrame) -> Result<()> {
        let target = match &*self
            .destination
            .read()
            .unwrap_or_else(|e| e.into_inner())
        {
            Destination::Ready(target) => Arc::clone(target),
            Destination::Created => {
                error!(
                    channel = %frame.channel,
                    id = %frame.detail.id,
                    "plugin channel: response due but no destination window is bound"
                );
                return Err(Error::DestinationNotBound {
                    channel: frame.channel,
                });
            },
        };

        let target_origin = self.binding.response_target_origin();
        let id = frame.detail.id.clone();
        let channel = frame.channel.clone();
        target.post_message(serde_json::to_value(frame)?, &target_origin)?;
        debug!(%channel, id = %id, %target_origin, "plugin channel: response posted");
        Ok(())
    }
}
