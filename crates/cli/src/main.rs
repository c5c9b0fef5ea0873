mod methods;
mod serve_command;
mod validate_command;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    xnft_config::{ResponseOriginMode, XnftConfig},
};

#[derive(Parser)]
#[command(name = "xnft-bridge", about = "xnft-bridge: plugin message channel over stdio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of searching the standard locations.
    #[arg(long, global = true, env = "XNFT_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    channel: ChannelArgs,
}

/// Channel settings that override the config file.
#[derive(clap::Args, Default)]
struct ChannelArgs {
    /// URL the plugin is served from.
    #[arg(long, global = true)]
    target_url: Option<String>,
    /// Channel name requests arrive on.
    #[arg(long, global = true)]
    request_channel: Option<String>,
    /// Channel name responses are posted on. Empty disables responses.
    #[arg(long, global = true)]
    response_channel: Option<String>,
    /// Post responses to the target URL's origin instead of "*".
    #[arg(long, global = true, default_value_t = false)]
    restrict_origin: bool,
}

impl ChannelArgs {
    fn apply(&self, config: &mut XnftConfig) {
        if let Some(url) = &self.target_url {
            config.channel.target_url = url.clone();
        }
        if let Some(name) = &self.request_channel {
            config.channel.request_channel = name.clone();
        }
        if let Some(name) = &self.response_channel {
            config.channel.response_channel = (!name.is_empty()).then(|| name.clone());
        }
        if self.restrict_origin {
            config.channel.response_origin = ResponseOriginMode::Target;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read message events from stdin as JSON lines and write posted
    /// responses to stdout.
    Serve,
    /// Validate the configuration and report errors/warnings.
    Validate {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the protocol; logs go to stderr.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load config from `--config` or the standard locations, then apply env
/// and command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<XnftConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = xnft_config::load_config(path)?;
            xnft_config::apply_env_overrides(&mut config);
            config
        },
        None => xnft_config::discover_and_load(),
    };
    cli.channel.apply(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "xnft-bridge starting");

    match cli.command {
        Commands::Serve => {
            let config = load_config(&cli)?;
            serve_command::serve(config).await
        },
        Commands::Validate { verbose } => {
            let result = match load_config(&cli) {
                Ok(config) => {
                    let mut result = xnft_config::validate(&config);
                    result.config_path = cli
                        .config
                        .clone()
                        .or_else(xnft_config::loader::find_config_file);
                    result
                },
                // Unreadable files become a syntax diagnostic.
                Err(e) => match &cli.config {
                    Some(path) => xnft_config::validate_file(path),
                    None => return Err(e),
                },
            };
            validate_command::report(&result, verbose)
        },
    }
}
