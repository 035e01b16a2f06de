//! Tracing subscriber setup

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`. Later calls are no-ops.
pub fn init_tracing(settings: &LoggingSettings) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

        let registry = tracing_subscriber::registry().with(filter);
        let result = if settings.json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .try_init()
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init()
        };

        // Another subscriber (e.g. a test harness) may already be installed.
        if let Err(e) = result {
            tracing::debug!("tracing subscriber already set: {}", e);
        }
    });
}
