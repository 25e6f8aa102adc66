//! # Configuration for the Device Pairing Client
//!
//! This module handles configuration loading and validation,
//! supporting both environment variables and configuration files
//! (JSON or TOML, chosen by file extension).

use crate::constants::*;
use crate::error::{PairingError, PairingResult};
use crate::types::KeyAlgorithm;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// PAIRING CONFIGURATION
// =============================================================================

/// Configuration of one device's pairing run
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Base URL of the pairing service (may carry a path prefix)
    pub pairing_url: String,

    /// Realm the device belongs to
    pub realm: String,

    /// Device id, also sent as the hardware id on registration
    pub device_id: String,

    /// Pairing token (JWT) used once for registration
    #[serde(skip_serializing, alias = "pairing_jwt")]
    pub pairing_token: Option<String>,

    /// Timeout applied when a call does not pass its own
    pub request_timeout_ms: u64,

    /// Algorithm of the key generated for the CSR
    pub key_algorithm: KeyAlgorithm,

    /// Accept any certificate from the pairing service (development only)
    pub ignore_tls_errors: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            pairing_url: DEFAULT_PAIRING_URL.into(),
            realm: String::new(),
            device_id: String::new(),
            pairing_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            key_algorithm: KeyAlgorithm::default(),
            ignore_tls_errors: false,
        }
    }
}

impl fmt::Debug for PairingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingConfig")
            .field("pairing_url", &self.pairing_url)
            .field("realm", &self.realm)
            .field("device_id", &self.device_id)
            .field("pairing_token", &self.pairing_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("key_algorithm", &self.key_algorithm)
            .field("ignore_tls_errors", &self.ignore_tls_errors)
            .finish()
    }
}

impl PairingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PairingResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> PairingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        Ok(config)
    }

    /// Overlay the variables that are set onto this configuration
    pub fn apply_lookup<F>(&mut self, lookup: F) -> PairingResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_PAIRING_URL) {
            self.pairing_url = url;
        }

        if let Some(realm) = lookup(ENV_REALM) {
            self.realm = realm;
        }

        if let Some(device_id) = lookup(ENV_DEVICE_ID) {
            self.device_id = device_id;
        }

        if let Some(token) = lookup(ENV_PAIRING_TOKEN) {
            self.pairing_token = Some(token);
        }

        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = timeout.trim().parse().map_err(|_| {
                PairingError::Configuration(format!(
                    "{ENV_REQUEST_TIMEOUT_MS} must be a number of milliseconds, got '{timeout}'"
                ))
            })?;
        }

        if let Some(flag) = lookup(ENV_IGNORE_TLS_ERRORS) {
            self.ignore_tls_errors = parse_flag(&flag).ok_or_else(|| {
                PairingError::Configuration(format!(
                    "{ENV_IGNORE_TLS_ERRORS} must be a boolean, got '{flag}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> PairingResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PairingError::Io(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&contents)?),
            Some("toml") => Ok(toml::from_str(&contents)?),
            _ => Err(PairingError::Configuration(format!(
                "unsupported configuration format: {}",
                path.display()
            ))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> PairingResult<()> {
        if self.pairing_url.trim().is_empty() {
            return Err(PairingError::Configuration("pairing_url is not set".into()));
        }

        if self.realm.is_empty() {
            return Err(PairingError::Configuration("realm is not set".into()));
        }

        if self.device_id.is_empty() {
            return Err(PairingError::Configuration("device_id is not set".into()));
        }

        Ok(())
    }

    /// Default per-request timeout; a zero setting falls back to the built-in default
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_ms {
            0 => Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Get the pairing token (if set)
    pub fn pairing_token(&self) -> PairingResult<&str> {
        self.pairing_token
            .as_deref()
            .ok_or_else(|| PairingError::MissingEnvVar(ENV_PAIRING_TOKEN.into()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
