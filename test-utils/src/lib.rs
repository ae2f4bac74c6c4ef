//! Shared test utilities for the Vault session crates.
//!
//! This crate provides:
//! - Scripted mocks for authentication, transport and scheduling
//! - Proptest generators for tokens and Vault status codes
//! - Vault JSON response fixtures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::{ManualScheduler, MockAuthentication, MockResponse, MockTransport, RecordedCall};
