use std::sync::Arc;

use {
    anyhow::{Result, bail},
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
        task::JoinSet,
    },
    tracing::{error, info, warn},
    xnft_channels::{LocalWindow, Mailbox, PluginChannel, PostedMessage},
    xnft_config::{Severity, XnftConfig},
    xnft_metrics::{MetricsRecorderConfig, init_metrics},
    xnft_protocol::MessageEvent,
};

use crate::methods::builtin_methods;

/// Origin label of the in-memory host window events are delivered to.
const BRIDGE_WINDOW_ORIGIN: &str = "xnft-bridge";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub events: u64,
    pub skipped_lines: u64,
    pub responses: u64,
    pub failures: u64,
}

pub async fn serve(config: XnftConfig) -> Result<()> {
    let validation = xnft_config::validate(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Info => info!(path = %d.path, category = d.category, "{}", d.message),
        }
    }
    if validation.has_errors() {
        bail!("invalid configuration; run `xnft-bridge validate` for details");
    }

    let metrics = init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("service".into(), "xnft-bridge".into())],
    })?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    tokio::select! {
        stats = run(&config, stdin, &mut stdout) => {
            let stats = stats?;
            info!(
                events = stats.events,
                skipped_lines = stats.skipped_lines,
                responses = stats.responses,
                failures = stats.failures,
                "input closed, shutting down"
            );
        },
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    let rendered = metrics.render();
    if !rendered.is_empty() {
        eprintln!("{rendered}");
    }
    Ok(())
}

/// Pump newline-delimited `MessageEvent`s from `input` through a plugin
/// channel and write every posted response to `output` as one JSON line.
///
/// Events are handled concurrently. Returns once `input` is exhausted and
/// every in-flight request has finished.
pub async fn run<R, W>(config: &XnftConfig, input: R, output: &mut W) -> Result<BridgeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let window = LocalWindow::new(
        config
            .client
            .host_origin
            .as_deref()
            .unwrap_or(BRIDGE_WINDOW_ORIGIN),
    );
    let channel = PluginChannel::from_config(Arc::new(window.clone()), &config.channel)?;
    let (mailbox, mut posted) = Mailbox::new();
    channel.set_destination_window(Arc::new(mailbox));
    let subscription = channel.register(builtin_methods(channel.binding()));

    let mut stats = BridgeStats::default();
    let mut tasks = JoinSet::new();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<MessageEvent>(line) {
                    Ok(event) => {
                        stats.events += 1;
                        let window = window.clone();
                        tasks.spawn(async move { window.dispatch(event).await });
                    },
                    Err(e) => {
                        stats.skipped_lines += 1;
                        warn!(error = %e, "skipping input line that is not a message event");
                    },
                }
            },
            Some(message) = posted.recv() => {
                write_line(output, &message).await?;
                stats.responses += 1;
            },
            Some(joined) = tasks.join_next() => record(&mut stats, joined),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        record(&mut stats, joined);
    }
    subscription.unsubscribe();
    drop(channel);

    // Every handler has finished; whatever they posted is already queued.
    while let Some(message) = posted.recv().await {
        write_line(output, &message).await?;
        stats.responses += 1;
    }
    Ok(stats)
}

fn record(
    stats: &mut BridgeStats,
    joined: std::result::Result<Vec<xnft_channels::Result<()>>, tokio::task::JoinError>,
) {
    match joined {
        Ok(results) => {
            for e in results.into_iter().filter_map(std::result::Result::err) {
                stats.failures += 1;
                warn!(error = %e, "request failed");
            }
        },
        Err(e) => {
            stats.failures += 1;
            error!(error = %e, "dispatch task panicked");
        },
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, message: &PostedMessage) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}
