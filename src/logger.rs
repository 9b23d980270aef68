//! Log output setup.
//!
//! Diagnostics go through `tracing`; build summaries are printed to stdout
//! by [`crate::output`]. The level is chosen in this order:
//!
//! 1. `--verbose`: debug for pagepack
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`, when set
//! 4. info for pagepack, warnings for everything else

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter for the given flags, ignoring `RUST_LOG`.
pub fn filter_directives(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "warn,pagepack=debug"
    } else if quiet {
        "error"
    } else {
        "warn,pagepack=info"
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose || quiet {
        EnvFilter::new(filter_directives(verbose, quiet))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directives(false, false)))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
