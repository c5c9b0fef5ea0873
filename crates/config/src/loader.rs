use std::path::{Path, PathBuf};

use {
    tracing::{debug, warn},
    xnft_common::{Error, Result},
};

use crate::{env_subst::substitute_env, schema::XnftConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["xnft.toml", "xnft.yaml", "xnft.yml", "xnft.json"];

mod ctx {
    pub use xnft_common::{Error, Result};
    xnft_common::impl_context!();
}

use ctx::Context;

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<XnftConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./xnft.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/xnft/xnft.{toml,yaml,yml,json}` (user-global)
///
/// Returns `XnftConfig::default()` if no config file is found or the file
/// cannot be loaded.
pub fn discover_and_load() -> XnftConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                XnftConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            XnftConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/xnft/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "xnft").map(|d| d.config_dir().to_path_buf())
}

/// Override channel settings from `XNFT_TARGET_URL`, `XNFT_REQUEST_CHANNEL`
/// and `XNFT_RESPONSE_CHANNEL`.
pub fn apply_env_overrides(config: &mut XnftConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut XnftConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("XNFT_TARGET_URL") {
        debug!(target_url = %url, "target url overridden from env");
        config.channel.target_url = url;
    }
    if let Some(name) = lookup("XNFT_REQUEST_CHANNEL") {
        config.channel.request_channel = name;
    }
    if let Some(name) = lookup("XNFT_RESPONSE_CHANNEL") {
        // An empty value switches the channel to fire-and-forget.
        config.channel.response_channel = (!name.is_empty()).then_some(name);
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<XnftConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse("TOML", e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse("YAML", e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse("JSON", e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use {super::*, crate::schema::ResponseOriginMode};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "xnft.toml",
            r#"
[channel]
target_url = "https://plugin.example/app"
request_channel = "plugin-request"
response_channel = "plugin-response"
response_origin = "target"

[client]
request_timeout_ms = 500
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.channel.target_url, "https://plugin.example/app");
        assert_eq!(cfg.channel.response_channel.as_deref(), Some("plugin-response"));
        assert_eq!(cfg.channel.response_origin, ResponseOriginMode::Target);
        assert_eq!(cfg.client.request_timeout_ms, 500);
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(
            &dir,
            "xnft.yaml",
            "channel:\n  target_url: https://p.example/\n  request_channel: req\n",
        );
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.channel.request_channel, "req");
        assert_eq!(cfg.channel.response_channel, None);

        let json = write(
            &dir,
            "xnft.json",
            r#"{"channel":{"request_channel":"req"},"metrics":{"enabled":true}}"#,
        );
        let cfg = load_config(&json).unwrap();
        assert!(cfg.metrics.enabled);
        assert_eq!(
            cfg.client.request_timeout_ms,
            xnft_protocol::DEFAULT_REQUEST_TIMEOUT_MS
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "xnft.ini", "x=1");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn reports_parse_errors_with_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "xnft.toml", "[channel\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { format: "TOML", .. }));
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_config(Path::new("/nonexistent/xnft.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to read /nonexistent/xnft.toml"));
    }

    #[test]
    fn env_overrides_replace_channel_fields() {
        let mut cfg = XnftConfig::default();
        cfg.channel.response_channel = Some("old".into());
        apply_env_overrides_with(&mut cfg, |name| match name {
            "XNFT_TARGET_URL" => Some("https://p.example/app".into()),
            "XNFT_RESPONSE_CHANNEL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.channel.target_url, "https://p.example/app");
        assert_eq!(cfg.channel.request_channel, "");
        assert_eq!(cfg.channel.response_channel, None);
    }
}
