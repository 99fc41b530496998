//! tracing-subscriber setup. Logs go to stderr; stdout belongs to the console UI.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `level` is an EnvFilter directive, `format` is "text" or "json".
pub fn init(level: &str, format: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .init(),
        _ => fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}
