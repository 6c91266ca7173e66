//! Unified error type for the Bluffline host.

use bluffline_room::{BackendError, RegistryError};

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BlufflineError {
    /// A session could not be found, created or reached.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A backend lookup the host needed failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
