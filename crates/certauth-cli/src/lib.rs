pub mod cli;
pub mod commands;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: `info`, raised one level per `-v`.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber on stderr. `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
