//! Configuration validation.
//!
//! Checks a loaded configuration for values the channel cannot work with
//! and reports security-relevant settings.

use std::path::{Path, PathBuf};

use url::Url;

use crate::{
    loader::load_config,
    schema::{ResponseOriginMode, XnftConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "missing", "invalid-url", "channel", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "channel.target_url"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_owned(),
            message: message.into(),
        });
    }
}

/// Load and validate the file at `path`.
pub fn validate_file(path: &Path) -> ValidationResult {
    let mut result = match load_config(path) {
        Ok(config) => validate(&config),
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "syntax", "", e.to_string());
            result
        },
    };
    result.config_path = Some(path.to_path_buf());
    result
}

/// Validate an already loaded configuration.
pub fn validate(config: &XnftConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let channel = &config.channel;

    if channel.target_url.is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "channel.target_url",
            "target URL is required",
        );
    } else {
        match Url::parse(&channel.target_url) {
            Ok(url) if !url.origin().is_tuple() => result.push(
                Severity::Error,
                "invalid-url",
                "channel.target_url",
                format!(
                    "`{}` has an opaque origin; no message can match it",
                    channel.target_url
                ),
            ),
            Ok(_) => {},
            Err(e) => result.push(
                Severity::Error,
                "invalid-url",
                "channel.target_url",
                format!("`{}` is not a valid URL: {e}", channel.target_url),
            ),
        }
    }

    if channel.request_channel.is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "channel.request_channel",
            "request channel name is required",
        );
    }

    match channel.response_channel.as_deref() {
        Some("") => result.push(
            Severity::Error,
            "channel",
            "channel.response_channel",
            "response channel name is empty; omit it to disable responses",
        ),
        Some(name) if name == channel.request_channel => result.push(
            Severity::Warning,
            "channel",
            "channel.response_channel",
            "responses share the request channel name and may be read back as requests",
        ),
        Some(_) if channel.response_origin == ResponseOriginMode::Any => result.push(
            Severity::Info,
            "security",
            "channel.response_origin",
            "responses are posted with target origin \"*\"; set response_origin = \"target\" to restrict them",
        ),
        _ => {},
    }

    if config.client.request_timeout_ms == 0 {
        result.push(
            Severity::Error,
            "missing",
            "client.request_timeout_ms",
            "request timeout must be greater than zero",
        );
    }

    if let Some(origin) = config.client.host_origin.as_deref()
        && Url::parse(origin).map_or(true, |u| u.origin().ascii_serialization() != origin)
    {
        result.push(
            Severity::Warning,
            "invalid-url",
            "client.host_origin",
            format!("`{origin}` is not a serialized origin (scheme://host[:port])"),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {super::*, rstest::rstest};

    fn valid() -> XnftConfig {
        let mut cfg = XnftConfig::default();
        cfg.channel.target_url = "https://plugin.example/app".into();
        cfg.channel.request_channel = "plugin-request".into();
        cfg.channel.response_channel = Some("plugin-response".into());
        cfg.channel.response_origin = ResponseOriginMode::Target;
        cfg
    }

    #[test]
    fn valid_config_has_no_diagnostics() {
        let result = validate(&valid());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[rstest]
    #[case("", "missing")]
    #[case("not a url", "invalid-url")]
    #[case("data:text/plain,hi", "invalid-url")]
    fn bad_target_url_is_an_error(#[case] url: &str, #[case] category: &str) {
        let mut cfg = valid();
        cfg.channel.target_url = url.into();
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, category);
        assert_eq!(result.diagnostics[0].path, "channel.target_url");
    }

    #[test]
    fn empty_request_channel_is_an_error() {
        let mut cfg = valid();
        cfg.channel.request_channel.clear();
        assert!(validate(&cfg).has_errors());
    }

    #[test]
    fn shared_channel_name_warns() {
        let mut cfg = valid();
        cfg.channel.response_channel = Some("plugin-request".into());
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn wildcard_response_origin_is_reported() {
        let mut cfg = valid();
        cfg.channel.response_origin = ResponseOriginMode::Any;
        let result = validate(&cfg);
        assert_eq!(result.count(Severity::Info), 1);
        assert_eq!(result.diagnostics[0].category, "security");
    }

    #[test]
    fn fire_and_forget_skips_origin_notice() {
        let mut cfg = valid();
        cfg.channel.response_channel = None;
        cfg.channel.response_origin = ResponseOriginMode::Any;
        assert!(validate(&cfg).diagnostics.is_empty());
    }

    #[rstest]
    #[case("https://wallet.example", 0)]
    #[case("https://wallet.example/", 1)]
    #[case("wallet", 1)]
    fn host_origin_must_be_serialized(#[case] origin: &str, #[case] warnings: usize) {
        let mut cfg = valid();
        cfg.client.host_origin = Some(origin.into());
        assert_eq!(validate(&cfg).count(Severity::Warning), warnings);
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let mut cfg = valid();
        cfg.client.request_timeout_ms = 0;
        assert!(validate(&cfg).has_errors());
    }

    #[test]
    fn unreadable_file_becomes_syntax_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xnft.toml");
        std::fs::write(&path, "channel = 3").unwrap();
        let result = validate_file(&path);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
