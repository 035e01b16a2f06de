//! EntityStore Common - Shared utilities and types
//!
//! This crate provides functionality used by every EntityStore backend:
//! - Error types and handling
//! - Configuration management
//! - Tracing setup and operation metrics

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use config::Config;
pub use error::{ConnectionError, Error, PreconditionError, Result, StoreError};
