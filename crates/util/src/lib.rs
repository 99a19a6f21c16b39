// SPDX-License-Identifier: PolyForm-Shield-1.0

pub mod logging {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    /// Install the global subscriber. Filter comes from `RUST_LOG`, falling
    /// back to `info`. Logs go to stderr so command output on stdout stays
    /// clean for scripts.
    pub fn init_tracing() {
        init_tracing_with_default("info");
    }

    /// Same as [`init_tracing`] with a caller-chosen fallback filter. A
    /// second call is a no-op.
    pub fn init_tracing_with_default(default_filter: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .try_init();
    }

}
