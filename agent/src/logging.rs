use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::control::log_buffer::LogBuffer;

/// Extends `warden_common::logging::init`'s stdout layer with a second
/// `fmt` layer writing into `buffer`, backing the `/log` control endpoint.
pub fn init(debug: bool, buffer: LogBuffer) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(buffer).with_ansi(false))
        .init();
}
