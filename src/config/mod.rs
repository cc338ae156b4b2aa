//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{ExportCli, JobCli, LogArgs, ModelArgs};
pub use settings::{ExportSettings, Settings};

use tracing_subscriber::EnvFilter;

/// Initialize diagnostics on stderr
///
/// stdout is reserved for machine-readable results. `RUST_LOG` overrides the
/// verbosity flags.
pub fn init_logging(log: &LogArgs) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
