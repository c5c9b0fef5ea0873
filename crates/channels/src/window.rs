use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};

use {
    serde_json::Value,
    tracing::{debug, error},
    xnft_protocol::{MessageEvent, TargetOrigin},
};

use crate::{
    Error, Result,
    source::{EventSource, MessageListener, Subscription},
    target::MessageTarget,
};

/// An in-memory window: an origin plus the `message` listeners attached to it.
///
/// Cloning yields another reference to the same window.
#[derive(Clone)]
pub struct LocalWindow {
    inner: Arc<WindowInner>,
}

struct WindowInner {
    origin: String,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, MessageListener)>>,
}

impl WindowInner {
    fn listeners(&self) -> Vec<MessageListener> {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    /// Fire-and-forget delivery: one task per listener.
    fn post(&self, event: MessageEvent) {
        for listener in self.listeners() {
            let fut = listener(event.clone());
            let origin = self.origin.clone();
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    error!(window = %origin, error = %e, "unhandled error in message listener");
                }
            });
        }
    }
}

impl LocalWindow {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                origin: origin.into(),
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deliver an event to every listener and wait for all of them.
    ///
    /// Listeners run concurrently; results come back in subscription order.
    pub async fn dispatch(&self, event: MessageEvent) -> Vec<Result<()>> {
        let futs = self
            .inner
            .listeners()
            .into_iter()
            .map(|listener| listener(event.clone()));
        futures::future::join_all(futs).await
    }

    /// Deliver an event in the background, like a browser event loop.
    ///
    /// Listener errors are logged, as an unhandled rejection would be.
    /// Must be called from within a tokio runtime.
    pub fn post(&self, event: MessageEvent) {
        self.inner.post(event);
    }

    /// A reference to this window as seen by a window of `sender_origin`.
    ///
    /// Messages posted through the handle arrive here with
    /// `event.origin == sender_origin`. The handle does not keep the window
    /// alive.
    pub fn handle(&self, sender_origin: impl Into<String>) -> WindowHandle {
        WindowHandle {
            window: Arc::downgrade(&self.inner),
            window_origin: self.inner.origin.clone(),
            sender_origin: sender_origin.into(),
        }
    }
}

impl EventSource for LocalWindow {
    fn subscribe(&self, listener: MessageListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));

        let window = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(window) = window.upgrade() {
                window
                    .listeners
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|(lid, _)| *lid != id);
            }
        })
    }
}

/// Reference to a [`LocalWindow`] used to post messages into it.
///
/// Delivery goes through [`LocalWindow::post`], so
/// [`MessageTarget::post_message`] must be called from within a tokio
/// runtime.
#[derive(Clone)]
pub struct WindowHandle {
    window: Weak<WindowInner>,
    window_origin: String,
    sender_origin: String,
}

impl WindowHandle {
    pub fn window_origin(&self) -> &str {
        &self.window_origin
    }
}

impl MessageTarget for WindowHandle {
    fn post_message(&self, message: Value, target_origin: &TargetOrigin) -> Result<()> {
        let Some(window) = self.window.upgrade() else {
            return Err(Error::WindowClosed {
                origin: self.window_origin.clone(),
            });
        };
        if !target_origin.permits(&window.origin) {
            debug!(
                window = %window.origin,
                target_origin = %target_origin,
                "message dropped: target origin does not match window"
            );
            return Ok(());
        }
        window.post(MessageEvent::new(self.sender_origin.clone(), message));
        Ok(())
    }
}
