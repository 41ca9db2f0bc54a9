//! SiteBroker Core Types
//!
//! This crate provides the fundamental types shared by every SiteBroker crate:
//! - Tenant identity and per-tenant configuration
//! - Typed credentials for the primary site and each secondary service
//! - Core error types and the call-boundary result shape

pub mod error;
pub mod service;
pub mod tenant;
pub mod tool_result;

pub use error::{Error, Result};
pub use service::{ServiceCredential, ServiceKind};
pub use tenant::{PrimaryCredential, TenantConfig, TenantId};
pub use tool_result::ToolResult;
