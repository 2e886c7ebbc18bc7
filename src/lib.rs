//! Trustgate - Permission & Zero-Trust Policy Resolution Engine
//!
//! This crate provides the decision core for zero-trust authorization:
//! a wildcard permission catalog, role hierarchy resolution, per-user grant
//! overrides, trust scoring, fail-closed policy evaluation, and alert
//! correlation.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod policy;
pub mod repository;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{EngineError, Result};
