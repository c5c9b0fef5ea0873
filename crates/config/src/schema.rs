/// Config schema types (plugin channel, client, metrics).
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XnftConfig {
    pub channel: ChannelConfig,
    pub client: ClientConfig,
    pub metrics: MetricsConfig,
}

/// Host side of a plugin channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// URL the plugin is served from. Inbound requests must come from its
    /// origin and carry its exact href.
    pub target_url: String,
    pub request_channel: String,
    /// When unset, requests are handled without ever posting a response.
    pub response_channel: Option<String>,
    pub response_origin: ResponseOriginMode,
}

/// Target origin used when posting responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOriginMode {
    /// Post with `"*"`.
    #[default]
    Any,
    /// Post restricted to the origin of `target_url`.
    Target,
}

/// Plugin side of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_ms: u64,
    /// Origin responses are expected from. Unset accepts any origin.
    pub host_origin: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: xnft_protocol::DEFAULT_REQUEST_TIMEOUT_MS,
            host_origin: None,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}
