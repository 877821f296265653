//! Logging initialization for openvas-sync.
//!
//! Log lines go to stderr so stdout carries only command output.

use anyhow::{Context, Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use openvas_sync_core::config::GeneralConfig;

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber.
///
/// Filter precedence: `RUST_LOG`, then `--log-level`, then `general.log_level`.
/// `general.log_format` selects `json` lines or `pretty` multi-line output.
pub fn init_tracing(config: &GeneralConfig, level_override: Option<&str>) -> Result<()> {
    let output = output_layer(&config.log_format)?;
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(&directives).context("invalid RUST_LOG directives")?
        }
        _ => {
            let level = level_override.unwrap_or(&config.log_level);
            EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?
        }
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .context("tracing subscriber already installed")
}

fn output_layer(format: &str) -> Result<OutputLayer> {
    let layer: OutputLayer = match format {
        "json" => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed(),
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    Ok(layer)
}
