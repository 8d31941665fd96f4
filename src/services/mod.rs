// src/services/mod.rs
//! Business logic and the HTTP API surface.

pub mod api_server;
pub mod client_registry;
pub mod orchestrator;

pub use api_server::ApiServer;
pub use client_registry::ClientRegistry;
pub use orchestrator::{OrchestratorConfig, PresentationOrchestrator};
