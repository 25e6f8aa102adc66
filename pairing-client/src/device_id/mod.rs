//! # Device Id
//!
//! Device ids are 128-bit values encoded as base64url without padding, which
//! always yields 22 characters. They are either random or derived from a
//! namespace and unique hardware data, so the same device always gets the
//! same id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    constants::{DEVICE_ID_BYTES, DEVICE_ID_LENGTH},
    error::{PairingError, PairingResult},
};

/// A validated device id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Random id from a version 4 UUID
    pub fn random() -> Self {
        Self::from_bytes(Uuid::new_v4().as_bytes())
    }

    /// Deterministic id from a version 5 UUID over `namespace` and `data`
    pub fn derive(namespace: &Uuid, data: &[u8]) -> Self {
        Self::from_bytes(Uuid::new_v5(namespace, data).as_bytes())
    }

    pub fn from_bytes(bytes: &[u8; DEVICE_ID_BYTES]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Validate an encoded id
    pub fn parse(encoded: &str) -> PairingResult<Self> {
        if encoded.len() != DEVICE_ID_LENGTH {
            return Err(PairingError::InvalidDeviceId(format!(
                "expected {DEVICE_ID_LENGTH} characters, got {}",
                encoded.len()
            )));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| PairingError::InvalidDeviceId(e.to_string()))?;

        if bytes.len() != DEVICE_ID_BYTES {
            return Err(PairingError::InvalidDeviceId(format!(
                "expected {DEVICE_ID_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self(encoded.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; DEVICE_ID_BYTES] {
        let mut bytes = [0u8; DEVICE_ID_BYTES];
        // length checked on construction
        if let Ok(decoded) = URL_SAFE_NO_PAD.decode(&self.0) {
            bytes.copy_from_slice(&decoded[..DEVICE_ID_BYTES]);
        }
        bytes
    }
}

impl FromStr for DeviceId {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}
