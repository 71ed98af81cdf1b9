//! Logging and tracing initialization.
//!
//! Logs always go to stderr so they never mix with the messages the CLI
//! prints on stdout.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = build_subscriber(env_filter, config.json, std::io::stderr);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Subscriber writing fmt or JSON lines to `writer`.
pub fn build_subscriber<W>(
    env_filter: EnvFilter,
    json: bool,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    if json {
        Box::new(
            fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .json()
                .finish(),
        )
    } else {
        Box::new(
            fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(writer)
                .finish(),
        )
    }
}

/// Build the logging config for a run: `--verbose` forces debug level,
/// otherwise the configured level is kept.
pub fn effective_logging(configured: &LoggingConfig, verbose: bool) -> LoggingConfig {
    let mut config = configured.clone();
    if verbose {
        config.level = "debug".to_string();
    }
    config
}
