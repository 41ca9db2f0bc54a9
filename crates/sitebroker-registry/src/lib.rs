//! SiteBroker Site Registry
//!
//! This crate provides the per-site connection table for SiteBroker:
//! - Site registration with best-effort preflight probing
//! - Connection resolution by site and service
//! - The active-site pointer
//! - `RegistryHandle`, the entry point callers thread through their code

mod handle;
mod preflight;
pub mod registry;

pub use handle::RegistryHandle;
pub use registry::ConnectionRegistry;
