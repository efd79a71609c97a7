//! Ring Configuration Module
//!
//! Tunable parameters of the connectivity builder, loaded from TOML. The
//! hardware tables themselves are compiled in (see `crate::tables`); only the
//! policies around them live here.
//!
//! ## Loading Order
//!
//! 1. `RPC_RING_CONFIG` environment variable (path to TOML file)
//! 2. `ring_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(RingConfig::load());
//!
//! // Anywhere in the codebase:
//! let tolerance = config::current().virtual_strips.gap_tolerance;
//! ```

mod ring_config;
pub mod defaults;
pub mod validation;

pub use ring_config::*;

use std::sync::OnceLock;

/// Global ring configuration, initialized once at startup.
static RING_CONFIG: OnceLock<RingConfig> = OnceLock::new();

/// Initialize the global ring configuration.
///
/// Only the first call takes effect.
pub fn init(config: RingConfig) {
    if RING_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, if `init()` has run.
pub fn get() -> Option<&'static RingConfig> {
    RING_CONFIG.get()
}

/// Global configuration, or the built-in defaults when `init()` has not run.
///
/// Library code reads through this so tests and embedders need no setup.
pub fn current() -> RingConfig {
    RING_CONFIG.get().cloned().unwrap_or_default()
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    RING_CONFIG.get().is_some()
}
