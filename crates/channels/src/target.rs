use {
    serde::Serialize,
    serde_json::Value,
    tokio::sync::mpsc,
    xnft_protocol::TargetOrigin,
};

use crate::{Error, Result};

/// Something messages can be posted to, like `window.postMessage`.
pub trait MessageTarget: Send + Sync {
    fn post_message(&self, message: Value, target_origin: &TargetOrigin) -> Result<()>;
}

/// A message as handed to a [`MessageTarget`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedMessage {
    #[serde(rename = "targetOrigin")]
    pub target_origin: TargetOrigin,
    pub message: Value,
}

/// A target that queues every posted message on an unbounded channel.
///
/// Used by the stdio bridge to forward responses and by tests to observe
/// what a channel posts.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

impl Mailbox {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PostedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageTarget for Mailbox {
    fn post_message(&self, message: Value, target_origin: &TargetOrigin) -> Result<()> {
        self.tx
            .send(PostedMessage {
                target_origin: target_origin.clone(),
                message,
            })
            .map_err(|e| Error::post("mailbox receiver dropped", e))
    }
}
