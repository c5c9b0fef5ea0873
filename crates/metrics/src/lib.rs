//! Metrics collection and export for the xnft plugin channel.
//!
//! Metric names live in this crate so that the channel crate and the bridge
//! binary agree on them. Recording goes through the `metrics` crate facade;
//! with no recorder installed every macro call is a no-op.
//!
//! ```rust,ignore
//! use xnft_metrics::{channel, counter, labels};
//!
//! counter!(channel::FILTERED_TOTAL, labels::REASON => "origin").increment(1);
//! ```
//!
//! # Features
//!
//! - `prometheus`: install a Prometheus recorder and render its text format

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
