//! Utility modules for siteforge
//!
//! - Structured logging setup and configuration
//! - The `define_id_enum!` macro used for detector and builder identifiers

#[macro_use]
mod id_enum;
pub mod logging;

pub use logging::{config_from_env, init_default, init_from_env, init_logging, parse_level, LoggingConfig};
