//! Structured logging setup.
//!
//! The pump reports every read, write and framing failure through `tracing`
//! with the peer label attached. This module installs a subscriber for
//! binaries that do not bring their own.

use tracing::dispatcher;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()))
}

/// Install a global fmt subscriber.
///
/// Idempotent: if a global subscriber is already installed, by this function
/// or by the host binary, it is left in place and `Ok(())` is returned.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if dispatcher::has_been_set() {
        return Ok(());
    }

    let builder = fmt().with_env_filter(env_filter(config)).with_target(true);
    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(app = %config.app_name, "Logging initialized");
            Ok(())
        }
        // Lost a race with another initializer
        Err(_) if dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(ProtocolError::Config(format!(
            "Failed to install logger: {e}"
        ))),
    }
}
