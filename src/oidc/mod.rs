// src/oidc/mod.rs
//! OIDC provider surface: signing key lifecycle, discovery metadata,
//! subject-identifier derivation, and the engine configuration snapshot.

pub mod discovery;
pub mod keys;
pub mod provider;
pub mod subject;

pub use discovery::{build_discovery_document, DiscoveryDocument};
pub use keys::{ensure_signing_key, SigningKey};
pub use provider::{init_provider, AuthorizationState, Provider, ProviderHandle};
pub use subject::SubjectIdentifierFactory;
