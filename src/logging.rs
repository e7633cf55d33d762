//! Diagnostic logging for embedders.
//!
//! The compiler only emits `tracing` events; installing a subscriber is up to
//! the host. [`init_logging`] installs a stderr formatter filtered by the
//! `KESTREL_LOG` variable (`KESTREL_LOG=kestrel_compiler=trace`).

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "KESTREL_LOG";

/// Install the global subscriber once. Defaults to `warn` when `KESTREL_LOG`
/// is unset or invalid; a subscriber installed by the host is left alone.
pub fn init_logging() {
    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .compact()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_harmless() {
        init_logging();
        init_logging();
        tracing::debug!("still running");
    }
}
