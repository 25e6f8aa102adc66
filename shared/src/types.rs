//! # Shared Data Types for the Device Pairing Client
//!
//! Value types returned by the pairing phases and the JSON envelopes sent to
//! the pairing service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::constants::*;
use crate::error::PairingError;

// =============================================================================
// PAIRING PHASES
// =============================================================================

/// HTTP method used by a pairing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// One of the four steps of the pairing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingPhase {
    /// Exchange the pairing token for a credentials secret
    Register,
    /// Look up the MQTT broker URL of the device
    ResolveBroker,
    /// Submit a CSR and obtain a signed client certificate
    IssueCertificate,
    /// Ask the service whether a client certificate is still valid
    VerifyCertificate,
}

impl PairingPhase {
    /// All phases, in the order a pairing run performs them
    pub const ALL: [PairingPhase; 4] = [
        PairingPhase::Register,
        PairingPhase::ResolveBroker,
        PairingPhase::IssueCertificate,
        PairingPhase::VerifyCertificate,
    ];

    /// HTTP method of the phase request
    pub fn method(&self) -> HttpMethod {
        match self {
            PairingPhase::ResolveBroker => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Status code the service answers with on success
    pub fn expected_status(&self) -> u16 {
        match self {
            PairingPhase::Register | PairingPhase::IssueCertificate => STATUS_CREATED,
            PairingPhase::ResolveBroker | PairingPhase::VerifyCertificate => STATUS_OK,
        }
    }

    /// JSON path of the value extracted from a successful response
    pub fn field(&self) -> &'static [&'static str] {
        match self {
            PairingPhase::Register => FIELD_CREDENTIALS_SECRET,
            PairingPhase::ResolveBroker => FIELD_BROKER_URL,
            PairingPhase::IssueCertificate => FIELD_CLIENT_CRT,
            PairingPhase::VerifyCertificate => FIELD_VALID,
        }
    }

    /// Whether repeating the request has no side effect on the service
    pub fn is_read_only(&self) -> bool {
        matches!(self, PairingPhase::ResolveBroker | PairingPhase::VerifyCertificate)
    }
}

impl fmt::Display for PairingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingPhase::Register => write!(f, "register"),
            PairingPhase::ResolveBroker => write!(f, "resolve_broker"),
            PairingPhase::IssueCertificate => write!(f, "issue_certificate"),
            PairingPhase::VerifyCertificate => write!(f, "verify_certificate"),
        }
    }
}

// =============================================================================
// KEY ALGORITHM
// =============================================================================

/// Algorithm of the device key generated for the CSR
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// ECDSA on NIST P-256 with SHA-256
    #[default]
    EcdsaP256,
    /// ECDSA on NIST P-384 with SHA-384
    EcdsaP384,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::EcdsaP256 => write!(f, "ecdsa_p256"),
            KeyAlgorithm::EcdsaP384 => write!(f, "ecdsa_p384"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ecdsa_p256" | "p256" => Ok(KeyAlgorithm::EcdsaP256),
            "ecdsa_p384" | "p384" => Ok(KeyAlgorithm::EcdsaP384),
            other => Err(PairingError::Configuration(format!(
                "unsupported key algorithm '{other}'"
            ))),
        }
    }
}

// =============================================================================
// PHASE RESULTS
// =============================================================================

/// Bearer secret authenticating every request after registration.
///
/// The value is wiped from memory on drop and never shows up in `Debug` or
/// `Display` output.
#[derive(Clone)]
pub struct CredentialSecret(Zeroizing<String>);

impl CredentialSecret {
    /// Wrap a secret received from the service or loaded by the caller
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Raw secret, for the `Authorization` header or caller-side storage
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialSecret").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// URL of the MQTT broker the device connects to after pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokerAddress(String);

impl BrokerAddress {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PEM-encoded X.509 client certificate issued by the pairing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCertificate(String);

impl DeviceCertificate {
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn as_pem(&self) -> &str {
        &self.0
    }

    pub fn into_pem(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a certificate verification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateValidity {
    /// Whether the service still accepts the certificate
    pub valid: bool,

    /// When the service performed the check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Expiry of the certificate, reported for valid certificates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,

    /// Machine-readable reason, reported for invalid certificates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    /// Human-readable details accompanying `cause`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CertificateValidity {
    /// A bare validity flag with no extra information
    pub fn from_flag(valid: bool) -> Self {
        Self {
            valid,
            timestamp: None,
            until: None,
            cause: None,
            details: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Check if the certificate expires within the given window.
    ///
    /// Invalid certificates always count as expiring; a valid certificate with
    /// no reported expiry never does.
    pub fn expires_within(&self, window: chrono::Duration) -> bool {
        if !self.valid {
            return true;
        }
        match self.until {
            Some(until) => until < Utc::now() + window,
            None => false,
        }
    }
}

// =============================================================================
// API REQUEST TYPES
// =============================================================================

/// Envelope wrapping every request body sent to the pairing service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairingRequest<T> {
    pub data: T,
}

impl<T> PairingRequest<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterDeviceData {
    /// Hardware id of the device, i.e. its device id
    pub hw_id: String,
}

/// Certificate issuance payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrData {
    /// PEM-encoded PKCS#10 request
    pub csr: String,
}

/// Certificate verification payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCertificateData {
    /// PEM-encoded client certificate
    pub client_crt: String,
}
