//! Configuration loading, env substitution, and validation.
//!
//! Config files: `xnft.toml`, `xnft.yaml`, `xnft.yml` or `xnft.json`,
//! searched in `./` then `~/.config/xnft/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file text.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{ChannelConfig, ClientConfig, MetricsConfig, ResponseOriginMode, XnftConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
