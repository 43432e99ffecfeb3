use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

fn resolve_filter() -> EnvFilter {
    if let Ok(raw) = std::env::var("DIGEST_LOG")
        && let Ok(filter) = EnvFilter::try_new(raw.trim())
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Route `tracing` output to stderr so stdout stays reserved for the command report.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
