// src/agent/mod.rs
//! Credential-agent gateway.
//!
//! A narrow, stateless translation layer over the remote credential
//! agent's REST admin API. Every operation is one HTTP call; tenancy
//! headers come from a provider chosen once at construction time.

pub mod client;
pub mod models;
pub mod tenancy;

pub use client::AgentClient;
pub use tenancy::{tenancy_from_settings, MultiTenant, SingleTenant, TenancyHeaders};
