//! # Valoriza Common Library
//!
//! Shared code for the valoriza crates:
//! - Error type used across the workspace
//! - TOML configuration loading and file resolution
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
