//! Logging Bootstrap
//!
//! Installs the global `tracing` subscriber. Called once by the binary;
//! library code only emits events.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "control_sweep=info,control_sweep_verification=info";

/// Build the filter directive for a `-v` count.
pub fn filter_for(verbosity: u8) -> String {
    match verbosity {
        0 => DEFAULT_FILTER.to_string(),
        1 => "control_sweep=debug,control_sweep_verification=debug".to_string(),
        _ => "control_sweep=trace,control_sweep_verification=trace,control_sweep_core=trace"
            .to_string(),
    }
}

/// Initialise logging. `RUST_LOG` takes precedence over `verbosity`.
pub fn init(verbosity: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) is ignored.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
