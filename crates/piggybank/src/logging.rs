use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that switches log output to JSON lines.
pub const LOG_JSON_ENV: &str = "PIGGYBANK_LOG_JSON";

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output. Filtering follows `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var(LOG_JSON_ENV)
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
