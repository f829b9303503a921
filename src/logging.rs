use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Install the JSON subscriber used by the Lambda binary.
///
/// The filter is read from `LOG_LEVEL` (e.g. `INFO`, `debug`,
/// `bedrock_auth_proxy=debug,info`) and defaults to `info`.
pub fn init_json() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_level(true)
        .json()
        .with_current_span(false)
        .init();
}

/// Install a compact human-readable subscriber for the admin CLI.
pub fn init_compact() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .compact()
        .init();
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}
