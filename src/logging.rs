//! Log setup
//!
//! Logs go to stderr so `--json` output on stdout stays machine readable.
//! The filter comes from `CODELIFT_LOG`, then `RUST_LOG`, and defaults to `warn`.

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CODELIFT_LOG";

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("codelift=debug,warn");
    }
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
