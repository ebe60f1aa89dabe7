//! Miscellaneous test code for Wren.

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod prelude {
    pub use color_eyre::eyre::{bail, ensure, eyre, Report, Result};
}

static INIT: Once = Once::new();

/// Initialize a tracing subscriber and error reporting for a test.
///
/// Tests call this at the top so that failures print spans and a readable
/// report. Repeated calls are no-ops, so every test can call it without
/// coordinating.
pub fn init() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer().with_target(false);
        // Use the RUST_LOG env var, or by default show nothing below warn.
        let filter_layer =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(ErrorLayer::default())
            .init();

        color_eyre::install().expect("color_eyre installs only once");
    })
}
