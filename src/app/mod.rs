//! Application glue module
//!
//! Configuration and logging setup shared by the binaries.

mod config;

pub use config::{
    default_path, ColorPalette, Config, ConfigError, RenderTuning, TerminalConfig, WindowConfig,
};

/// Install the stderr log subscriber. `RUST_LOG` overrides `default`.
pub fn init_logging(default: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
