//! Tracing bootstrap

use tracing_subscriber::EnvFilter;

use crate::settings::RegistrySettings;

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init(settings: &RegistrySettings) {
    let filter = EnvFilter::try_new(&settings.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if settings.log_json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    }
}
