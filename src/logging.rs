use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Returns `false` if a subscriber was already
/// installed, so calling this more than once is harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "session_bridge=debug,warn".into()
        } else {
            "session_bridge=info,warn".into()
        }
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        debug!("Logging initialized. Set RUST_LOG environment variable to control log levels");
    }
    installed
}
