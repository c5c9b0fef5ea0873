//! Metric name and label definitions.

/// Host-side plugin channel metrics
pub mod channel {
    /// Message events seen by a registered channel listener
    pub const EVENTS_TOTAL: &str = "xnft_channel_events_total";
    /// Events dropped by the origin/href/type filter
    pub const FILTERED_TOTAL: &str = "xnft_channel_filtered_total";
    /// Events from the target that did not have a request's shape
    pub const MALFORMED_TOTAL: &str = "xnft_channel_malformed_total";
    /// Requests passed to the handler
    pub const REQUESTS_TOTAL: &str = "xnft_channel_requests_total";
    /// Handler invocations that returned an error
    pub const HANDLER_ERRORS_TOTAL: &str = "xnft_channel_handler_errors_total";
    /// Handler duration in seconds
    pub const HANDLER_DURATION_SECONDS: &str = "xnft_channel_handler_duration_seconds";
    /// Responses posted to the destination window
    pub const RESPONSES_POSTED_TOTAL: &str = "xnft_channel_responses_posted_total";
    /// Responses that could not be posted
    pub const RESPONSE_FAILURES_TOTAL: &str = "xnft_channel_response_failures_total";
}

/// Plugin-side client metrics
pub mod client {
    /// Calls sent to the host
    pub const CALLS_TOTAL: &str = "xnft_client_calls_total";
    /// Calls that did not receive a response in time
    pub const TIMEOUTS_TOTAL: &str = "xnft_client_timeouts_total";
    /// Calls waiting for a response
    pub const PENDING: &str = "xnft_client_pending";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const METHOD: &str = "method";
    pub const REASON: &str = "reason";
}

/// Histogram buckets
pub mod buckets {
    /// Handler duration buckets (in seconds)
    pub const HANDLER_DURATION: [f64; 10] =
        [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];
}
