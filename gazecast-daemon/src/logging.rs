use tracing_subscriber::EnvFilter;

/// Filter from RUST_LOG when set, else `default_level`, else `info`
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global fmt subscriber. Output goes to stderr so stdout stays
/// free for data.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
