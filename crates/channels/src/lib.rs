//! Plugin message channel.
//!
//! A [`PluginChannel`] listens on a window-like [`EventSource`], accepts only
//! requests from one plugin URL on one named channel, hands them to a
//! [`RequestHandler`] and posts the correlated `(result, error)` reply to a
//! late-bound destination window. [`PluginClient`] is the plugin-side
//! counterpart that issues calls and waits for those replies.

pub mod binding;
pub mod client;
pub mod error;
pub mod gating;
pub mod handler;
pub mod methods;
pub mod plugin;
pub mod source;
pub mod target;
pub mod window;

pub use {
    binding::ChannelBinding,
    client::PluginClient,
    error::{Error, Result},
    gating::{FilterReason, Verdict},
    handler::{FnHandler, RequestHandler, handler_fn},
    methods::{MethodContext, MethodFn, MethodRegistry, MethodResult},
    plugin::{DispatchOutcome, PluginChannel},
    source::{EventSource, ListenerFuture, MessageListener, Subscription},
    target::{Mailbox, MessageTarget, PostedMessage},
    window::{LocalWindow, WindowHandle},
    xnft_config::ResponseOriginMode,
};
