//! Plugin channel wire protocol.
//!
//! All communication uses JSON values posted over a window-style message
//! transport (`postMessage`). A sender posts a request into the hosting
//! context; the host answers on a second, named channel.
//!
//! Frame types:
//! - `MessageEvent`: raw event as delivered by a window's event source
//! - `RequestFrame`: plugin → host call on a request channel
//! - `ResponseFrame`: host → plugin correlated reply on a response channel

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Constants ────────────────────────────────────────────────────────────────

/// Target origin that lets any receiving window read a posted message.
pub const WILDCARD_ORIGIN: &str = "*";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000; // 30s

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
}

// ── Error shape ──────────────────────────────────────────────────────────────

/// Structured error carried in the `error` slot of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ErrorShape> for Value {
    fn from(shape: ErrorShape) -> Self {
        let mut obj = Map::new();
        obj.insert("code".into(), Value::String(shape.code));
        obj.insert("message".into(), Value::String(shape.message));
        if let Some(details) = shape.details {
            obj.insert("details".into(), details);
        }
        Value::Object(obj)
    }
}

// ── Correlation id ───────────────────────────────────────────────────────────

/// Opaque value linking a request to its response.
///
/// The sender picks it; the host echoes it back verbatim. Any JSON value is
/// accepted and neither format nor uniqueness is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Value);

impl CorrelationId {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The id as a string, when the sender used a string id.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(Value::String(id.to_owned()))
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(Value::String(id))
    }
}

impl From<Value> for CorrelationId {
    fn from(id: Value) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

// ── Target origin ────────────────────────────────────────────────────────────

/// Origin restriction applied when posting a message to a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetOrigin {
    /// `"*"`: delivered whatever the receiving window's origin is.
    #[default]
    Any,
    /// Delivered only if the receiving window has exactly this origin.
    Exact(String),
}

impl TargetOrigin {
    pub fn exact(origin: impl Into<String>) -> Self {
        Self::Exact(origin.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => WILDCARD_ORIGIN,
            Self::Exact(origin) => origin,
        }
    }

    /// Whether a window with `origin` may receive a message posted with this
    /// restriction.
    pub fn permits(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == origin,
        }
    }
}

impl From<String> for TargetOrigin {
    fn from(origin: String) -> Self {
        if origin == WILDCARD_ORIGIN {
            Self::Any
        } else {
            Self::Exact(origin)
        }
    }
}

impl From<TargetOrigin> for String {
    fn from(origin: TargetOrigin) -> Self {
        match origin {
            TargetOrigin::Any => WILDCARD_ORIGIN.to_owned(),
            TargetOrigin::Exact(origin) => origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Events ───────────────────────────────────────────────────────────────────

/// A message event as delivered to a window's listeners.
///
/// `origin` is the origin of the window that posted the message; `data` is
/// the posted value, untrusted and not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub origin: String,
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Why an event's payload could not be read as a channel request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedMessage {
    #[error("message data is not an object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("request detail is not an object")]
    DetailNotAnObject,

    #[error("request detail has no correlation id")]
    MissingCorrelationId,
}

/// The routing fields of a request payload, borrowed from the event data.
///
/// Parsing stops at `href`/`type` so that traffic for other channels can be
/// dropped before its `detail` is looked at.
#[derive(Debug, Clone, Copy)]
pub struct RequestEnvelope<'a> {
    pub href: &'a str,
    pub channel: &'a str,
    detail: Option<&'a Value>,
    data: &'a Value,
}

impl<'a> RequestEnvelope<'a> {
    /// Read the `href` and `type` fields of an event payload.
    pub fn parse(data: &'a Value) -> Result<Self, MalformedMessage> {
        let obj = data.as_object().ok_or(MalformedMessage::NotAnObject)?;
        Ok(Self {
            href: string_field(obj, "href")?,
            channel: string_field(obj, "type")?,
            detail: obj.get("detail"),
            data,
        })
    }

    /// Finish validation and extract the correlation id.
    pub fn into_message(self, origin: &str) -> Result<InboundMessage, MalformedMessage> {
        let detail = self
            .detail
            .ok_or(MalformedMessage::MissingField("detail"))?
            .as_object()
            .ok_or(MalformedMessage::DetailNotAnObject)?;
        let id = detail
            .get("id")
            .cloned()
            .ok_or(MalformedMessage::MissingCorrelationId)?;
        Ok(InboundMessage {
            origin: origin.to_owned(),
            href: self.href.to_owned(),
            channel: self.channel.to_owned(),
            id: CorrelationId(id),
            detail: detail.clone(),
            data: self.data.clone(),
        })
    }
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, MalformedMessage> {
    match obj.get(field) {
        None => Err(MalformedMessage::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(MalformedMessage::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// A request that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub href: String,
    pub channel: String,
    pub id: CorrelationId,
    /// The full `detail` object, including `id`.
    pub detail: Map<String, Value>,
    /// The event payload as posted, including any fields beyond
    /// `href`/`type`/`detail`.
    pub data: Value,
}

impl InboundMessage {
    pub fn method(&self) -> Option<&str> {
        self.detail.get("method").and_then(Value::as_str)
    }

    pub fn params(&self) -> Option<&Value> {
        self.detail.get("params")
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Plugin → host request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub href: String,
    #[serde(rename = "type")]
    pub channel: String,
    pub detail: RequestDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub id: CorrelationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    pub fn call(
        href: impl Into<String>,
        channel: impl Into<String>,
        id: impl Into<CorrelationId>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            href: href.into(),
            channel: channel.into(),
            detail: RequestDetail {
                id: id.into(),
                method: Some(method.into()),
                params,
            },
        }
    }
}

/// Host → plugin correlated reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(rename = "type")]
    pub channel: String,
    pub detail: ResponseDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDetail {
    pub id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseFrame {
    pub fn new(channel: impl Into<String>, id: CorrelationId, reply: RpcResponse) -> Self {
        Self {
            channel: channel.into(),
            detail: ResponseDetail {
                id,
                result: reply.result,
                error: reply.error,
            },
        }
    }
}

/// The `(result, error)` pair produced by a request handler.
///
/// At most one side is expected to be populated, but the pair is forwarded
/// as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcResponse {
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl RpcResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<Value>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_pair(self) -> (Option<Value>, Option<Value>) {
        (self.result, self.error)
    }
}

impl From<(Option<Value>, Option<Value>)> for RpcResponse {
    fn from((result, error): (Option<Value>, Option<Value>)) -> Self {
        Self { result, error }
    }
}

impl From<ResponseDetail> for RpcResponse {
    fn from(detail: ResponseDetail) -> Self {
        Self {
            result: detail.result,
            error: detail.error,
        }
    }
}
