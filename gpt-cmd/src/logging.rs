//! Diagnostics for `gpt_cmd` runs, written to stderr.
//!
//! What the user sees (goal, proposed commands, exit codes, banners) goes
//! through `io/console` on stdout and is printed regardless of `RUST_LOG`.
//! Tracing events describe loop internals: turn numbers, parse failures,
//! transcript saves and HTTP status codes. They are off below `warn` unless
//! asked for, e.g. `RUST_LOG=gpt_cmd=debug gpt_cmd "list files"`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber. Call once, before anything logs.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
