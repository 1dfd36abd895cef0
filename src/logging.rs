use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Environment variable consulted before falling back to `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "MELDER_LOG";

/// Install a global `fmt` subscriber filtered by `MELDER_LOG`, then
/// `RUST_LOG`, then `default_directive`.
///
/// Worker thread names are included so layered runs can be told apart.
///
/// # Errors
/// If a global subscriber has already been installed.
pub fn try_init(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let layer = fmt::layer().with_target(true).with_thread_names(true);
    Registry::default().with(filter).with(layer).try_init()
}

/// [`try_init`] at `info`, ignoring an already installed subscriber.
pub fn init() {
    if try_init("info").is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
