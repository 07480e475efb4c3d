/// Initializes the process-wide `tracing` subscriber. `ochopod_debug=true`
/// (per §6's boot env vars) lowers the default filter to `debug`; otherwise
/// `RUST_LOG` is honored as usual, falling back to `info`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
