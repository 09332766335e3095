//! ShardMeta Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, configuration and metadata value
//! types used across all ShardMeta components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
