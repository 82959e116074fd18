use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TDECK_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Logs go to stderr so they never interleave with shell output on stdout.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}
