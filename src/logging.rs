use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Output goes to stderr so stdout
/// stays free for the report. Verbosity is read from `RUST_LOG` and defaults to
/// `info`.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
