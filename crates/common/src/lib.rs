//! Error definitions and context helpers shared across the xnft crates.

pub mod error;

pub use error::{Error, FromMessage, Result};
