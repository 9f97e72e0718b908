//! Subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `info`, or `debug` for this crate
/// when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,aio_write_verify=debug"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
