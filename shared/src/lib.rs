//! # Shared Module for the Device Pairing Client
//!
//! This crate provides the configuration, constants, error taxonomy and value
//! types used by the pairing client library and its command-line tool.
//!
//! ## Pairing sequence
//!
//! | Phase | Request | Success | Value |
//! |-------|---------|---------|-------|
//! | register | `POST /v1/{realm}/agent/devices` | 201 | credentials secret |
//! | resolve broker | `GET /v1/{realm}/devices/{device_id}` | 200 | broker URL |
//! | issue certificate | `POST .../protocols/astarte_mqtt_v1/credentials` | 201 | client certificate |
//! | verify certificate | `POST .../credentials/verify` | 200 | validity |

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::*;
pub use constants::*;
pub use error::*;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
