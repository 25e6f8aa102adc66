//! # Endpoint Resolver
//!
//! Derives the request URL of every pairing phase from the base pairing URL,
//! the realm and the device id. The base URL is validated once, when the
//! endpoint is built.
//!
//! ## Routes
//!
//! ```text
//! register            POST {base}/v1/{realm}/agent/devices
//! resolve_broker      GET  {base}/v1/{realm}/devices/{device_id}
//! issue_certificate   POST {base}/v1/{realm}/devices/{device_id}/protocols/astarte_mqtt_v1/credentials
//! verify_certificate  POST {base}/v1/{realm}/devices/{device_id}/protocols/astarte_mqtt_v1/credentials/verify
//! ```

use std::fmt;
use url::Url;

use shared::{
    config::PairingConfig,
    constants::*,
    error::{PairingError, PairingResult},
    types::PairingPhase,
};

/// Immutable {base_url, realm, device_id} triple of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingEndpoint {
    /// Validated base URL
    base_url: Url,

    /// Path segments of the base URL, without trailing empty segments
    base_segments: Vec<String>,

    /// Realm name
    realm: String,

    /// Device id
    device_id: String,
}

impl PairingEndpoint {
    /// Validate the base URL and build the endpoint
    ///
    /// # Errors
    /// `InvalidEndpoint` if the URL is not absolute, cannot carry a path, or
    /// the realm or device id is empty.
    pub fn new(
        base_url: &str,
        realm: impl Into<String>,
        device_id: impl Into<String>,
    ) -> PairingResult<Self> {
        let realm = realm.into();
        let device_id = device_id.into();

        let parsed = Url::parse(base_url).map_err(|e| invalid_endpoint(base_url, e.to_string()))?;

        if parsed.cannot_be_a_base() {
            return Err(invalid_endpoint(base_url, "URL cannot carry a path"));
        }

        if realm.is_empty() {
            return Err(invalid_endpoint(base_url, "realm is empty"));
        }

        if device_id.is_empty() {
            return Err(invalid_endpoint(base_url, "device id is empty"));
        }

        let mut base_segments: Vec<String> = parsed
            .path_segments()
            .map(|segments| segments.map(str::to_owned).collect())
            .unwrap_or_default();
        while base_segments.last().is_some_and(|s| s.is_empty()) {
            base_segments.pop();
        }

        Ok(Self {
            base_url: parsed,
            base_segments,
            realm,
            device_id,
        })
    }

    /// Build the endpoint from a loaded configuration
    pub fn from_config(config: &PairingConfig) -> PairingResult<Self> {
        Self::new(&config.pairing_url, config.realm.as_str(), config.device_id.as_str())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Request URL of a pairing phase
    pub fn url_for(&self, phase: PairingPhase) -> Url {
        let mut url = self.base_url.clone();

        // cannot fail: cannot-be-a-base URLs are rejected in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .clear()
                .extend(&self.base_segments)
                .push(PAIRING_API_VERSION)
                .push(&self.realm);

            match phase {
                PairingPhase::Register => {
                    segments.extend(REGISTRATION_SEGMENTS);
                }
                PairingPhase::ResolveBroker => {
                    segments.push(DEVICES_SEGMENT).push(&self.device_id);
                }
                PairingPhase::IssueCertificate => {
                    segments
                        .push(DEVICES_SEGMENT)
                        .push(&self.device_id)
                        .extend(CREDENTIALS_SEGMENTS);
                }
                PairingPhase::VerifyCertificate => {
                    segments
                        .push(DEVICES_SEGMENT)
                        .push(&self.device_id)
                        .extend(CREDENTIALS_SEGMENTS)
                        .push(VERIFY_SEGMENT);
                }
            }
        }

        url
    }
}

impl fmt::Display for PairingEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.base_url, self.realm, self.device_id)
    }
}

fn invalid_endpoint(url: &str, reason: impl Into<String>) -> PairingError {
    PairingError::InvalidEndpoint {
        url: url.to_string(),
        reason: reason.into(),
    }
}
