// src/error.rs
//! Error types for the verifiable-credential OIDC controller.
//!
//! One taxonomy for the whole service. Gateway and key/discovery errors
//! propagate unchanged to their callers; the presentation orchestrator
//! converts gateway failures into a terminal `Failed` exchange state while
//! still surfacing the original error for logging.

use thiserror::Error;

/// Main error type for the controller.
#[derive(Error, Debug)]
pub enum Error {
    /// The remote credential agent could not be reached, returned a
    /// non-success status, or responded with an unexpected body shape.
    /// Never retried at this layer.
    #[error("credential agent unavailable: {0}")]
    AgentUnavailable(String),

    /// The OIDC signing key could not be generated, persisted, or loaded.
    /// Fatal at startup.
    #[error("signing key provisioning failed: {0}")]
    KeyProvisioning(String),

    /// Malformed issuer URL, unparseable settings, or other bad static
    /// configuration. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A client configuration was rejected at the registry boundary.
    /// Carries field-level detail for administrative callers.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation on a client or exchange that does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
