//! Shared library for cross-cutting concerns of the Vault session crates.
//!
//! This crate provides centralized implementations for:
//! - Error types with client-error and retryability classification
//! - HTTP client configuration and building
//! - Tracing subscriber installation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing, try_init_tracing};
