use std::{fmt, sync::Arc};

use {futures::future::BoxFuture, xnft_protocol::MessageEvent};

use crate::Result;

/// Future returned by a listener for one event.
pub type ListenerFuture = BoxFuture<'static, Result<()>>;

/// Callback invoked for every message event a source delivers.
pub type MessageListener = Arc<dyn Fn(MessageEvent) -> ListenerFuture + Send + Sync>;

/// A window-like source of message events.
///
/// Stands in for the hosting context's `message` event target so channels
/// can be driven by a browser bridge, an in-memory [`LocalWindow`] or a test.
///
/// [`LocalWindow`]: crate::LocalWindow
pub trait EventSource: Send + Sync {
    /// Attach a listener. Each delivered event invokes it once; errors from
    /// the returned future belong to whoever drives delivery.
    fn subscribe(&self, listener: MessageListener) -> Subscription;
}

/// Handle returned by [`EventSource::subscribe`].
///
/// Dropping it leaves the listener attached for the lifetime of the source;
/// call [`Subscription::unsubscribe`] to detach explicitly.
pub struct Subscription {
    id: u64,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(id: u64, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle for sources that cannot detach listeners.
    pub fn permanent(id: u64) -> Self {
        Self { id, detach: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detachable", &self.detach.is_some())
            .finish()
    }
}
