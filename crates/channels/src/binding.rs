use {url::Url, xnft_config::ResponseOriginMode, xnft_protocol::TargetOrigin};

use crate::{Error, Result};

/// Which plugin a channel talks to and on which channel names.
///
/// Built once per plugin instance and never changed afterwards. The late-bound
/// destination window lives next to it in
/// [`PluginChannel`](crate::PluginChannel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    target: Url,
    target_origin: String,
    request_channel: String,
    response_channel: Option<String>,
    response_origin: ResponseOriginMode,
}

impl ChannelBinding {
    pub fn new(
        target_url: &str,
        request_channel: impl Into<String>,
        response_channel: Option<String>,
    ) -> Result<Self> {
        let target = Url::parse(target_url).map_err(|source| Error::InvalidTargetUrl {
            url: target_url.to_owned(),
            source,
        })?;
        Ok(Self {
            target_origin: target.origin().ascii_serialization(),
            target,
            request_channel: request_channel.into(),
            // An empty name means no response channel.
            response_channel: response_channel.filter(|name| !name.is_empty()),
            response_origin: ResponseOriginMode::default(),
        })
    }

    #[must_use]
    pub fn with_response_origin(mut self, mode: ResponseOriginMode) -> Self {
        self.response_origin = mode;
        self
    }

    pub fn target_url(&self) -> &Url {
        &self.target
    }

    /// Serialized href of the target URL; inbound `data.href` must equal it.
    pub fn target_href(&self) -> &str {
        self.target.as_str()
    }

    /// Serialized origin of the target URL; inbound `event.origin` must equal it.
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    pub fn request_channel(&self) -> &str {
        &self.request_channel
    }

    pub fn response_channel(&self) -> Option<&str> {
        self.response_channel.as_deref()
    }

    pub fn response_origin(&self) -> ResponseOriginMode {
        self.response_origin
    }

    /// Target origin used when posting a response.
    pub fn response_target_origin(&self) -> TargetOrigin {
        match self.response_origin {
            ResponseOriginMode::Any => TargetOrigin::Any,
            ResponseOriginMode::Target => TargetOrigin::exact(&self.target_origin),
        }
    }
}
