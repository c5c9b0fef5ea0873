use std::fmt;

use xnft_protocol::{InboundMessage, MalformedMessage, MessageEvent, RequestEnvelope};

use crate::binding::ChannelBinding;

/// Which allow-list check an event failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// `event.origin` is not the target URL's origin.
    Origin,
    /// `data.href` is not the target URL's href.
    Href,
    /// `data.type` is not the request channel name.
    Channel,
}

impl FilterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Href => "href",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept(InboundMessage),
    Filtered(FilterReason),
    Malformed(MalformedMessage),
}

/// Decide whether an event is a request for this binding.
///
/// Origin, href and channel name are compared with strict string equality;
/// there is no pattern matching. The origin is checked before the payload is
/// parsed, so nothing posted by another origin is ever read.
pub fn inspect(binding: &ChannelBinding, event: &MessageEvent) -> Verdict {
    if event.origin != binding.target_origin() {
        return Verdict::Filtered(FilterReason::Origin);
    }

    let envelope = match RequestEnvelope::parse(&event.data) {
        Ok(envelope) => envelope,
        Err(reason) => return Verdict::Malformed(reason),
    };
    if envelope.href != binding.target_href() {
        return Verdict::Filtered(FilterReason::Href);
    }
    if envelope.channel != binding.request_channel() {
        return Verdict::Filtered(FilterReason::Channel);
    }

    match envelope.into_message(&event.origin) {
        Ok(message) => Verdict::Accept(message),
        Err(reason) => Verdict::Malformed(reason),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {rstest::rstest, serde_json::json};

    use super::*;

    fn binding() -> ChannelBinding {
        ChannelBinding::new(
            "https://plugin.example/app",
            "plugin-request",
            Some("plugin-response".into()),
        )
        .unwrap()
    }

    fn event(origin: &str, href: &str, channel: &str) -> MessageEvent {
        MessageEvent::new(
            origin,
            json!({ "href": href, "type": channel, "detail": { "id": "abc123" } }),
        )
    }

    #[test]
    fn accepts_exact_match() {
        let verdict = inspect(
            &binding(),
            &event(
                "https://plugin.example",
                "https://plugin.example/app",
                "plugin-request",
            ),
        );
        let message = match verdict {
            Verdict::Accept(message) => message,
            other => panic!("expected accept, got {other:?}"),
        };
        assert_eq!(message.id.as_str(), Some("abc123"));
        assert_eq!(message.origin, "https://plugin.example");
    }

    #[rstest]
    #[case("https://evil.example", "https://plugin.example/app", "plugin-request", FilterReason::Origin)]
    #[case("https://plugin.example:8443", "https://plugin.example/app", "plugin-request", FilterReason::Origin)]
    #[case("https://plugin.example/", "https://plugin.example/app", "plugin-request", FilterReason::Origin)]
    #[case("https://plugin.example", "https://plugin.example/app/", "plugin-request", FilterReason::Href)]
    #[case("https://plugin.example", "https://plugin.example/other", "plugin-request", FilterReason::Href)]
    #[case("https://plugin.example", "https://plugin.example/app", "plugin-response", FilterReason::Channel)]
    #[case("https://plugin.example", "https://plugin.example/app", "PLUGIN-REQUEST", FilterReason::Channel)]
    fn filters_any_mismatch(
        #[case] origin: &str,
        #[case] href: &str,
        #[case] channel: &str,
        #[case] reason: FilterReason,
    ) {
        assert_eq!(
            inspect(&binding(), &event(origin, href, channel)),
            Verdict::Filtered(reason)
        );
    }

    #[test]
    fn foreign_origin_is_filtered_even_when_malformed() {
        let ev = MessageEvent::new("https://evil.example", json!(42));
        assert_eq!(
            inspect(&binding(), &ev),
            Verdict::Filtered(FilterReason::Origin)
        );
    }

    #[test]
    fn trusted_origin_with_bad_shape_is_malformed() {
        let ev = MessageEvent::new("https://plugin.example", json!("ping"));
        assert_eq!(
            inspect(&binding(), &ev),
            Verdict::Malformed(MalformedMessage::NotAnObject)
        );

        let ev = MessageEvent::new(
            "https://plugin.example",
            json!({ "href": "https://plugin.example/app", "type": "plugin-request" }),
        );
        assert_eq!(
            inspect(&binding(), &ev),
            Verdict::Malformed(MalformedMessage::MissingField("detail"))
        );
    }

    #[test]
    fn other_channels_are_filtered_before_detail_is_checked() {
        let ev = MessageEvent::new(
            "https://plugin.example",
            json!({ "href": "https://plugin.example/app", "type": "other" }),
        );
        assert_eq!(
            inspect(&binding(), &ev),
            Verdict::Filtered(FilterReason::Channel)
        );
    }
}
