//! Tracing subscriber setup. Logs go to stderr so stdout stays parseable.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "PARITY_GATEWAY_LOG";

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub json: bool,
}

/// `PARITY_GATEWAY_LOG`, then `RUST_LOG`, then `debug`/`info` by verbosity.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(options: LogOptions) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(options.verbose))
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
