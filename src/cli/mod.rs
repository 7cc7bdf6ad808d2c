pub mod args;
pub mod commands;

pub use commands::run;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "info,tsaiken=debug" } else { "warn" })
    });

    // a second initialisation (tests, embedding) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
