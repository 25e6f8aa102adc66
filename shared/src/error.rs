//! # Error Types for the Device Pairing Client
//!
//! Every pairing phase either returns its value or fails with exactly one of
//! the pairing kinds below. The remaining variants are produced by the
//! configuration, device id and TLS helpers, never by a phase.

use std::fmt;
use thiserror::Error;

use crate::types::PairingPhase;

/// Boxed cause of a transport failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stage at which a request failed before a response was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// DNS resolution, TCP connect or TLS handshake
    Connect,
    /// The per-request timeout expired
    Timeout,
    /// Building, sending or reading the request/response body
    Request,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Connect => write!(f, "connect"),
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::Request => write!(f, "request"),
        }
    }
}

/// Why a successful response could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedCause {
    /// The body is not JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A key along the field path is absent
    #[error("missing field '{path}'")]
    MissingField { path: String },

    /// The field (or one of its parents) holds another JSON type
    #[error("field '{path}' is not {expected}")]
    UnexpectedType { path: String, expected: &'static str },
}

/// Main error type of the pairing client
#[derive(Error, Debug)]
pub enum PairingError {
    // =========================================================================
    // PAIRING ERRORS
    // =========================================================================

    /// The base pairing URL, realm or device id cannot form request URLs
    #[error("Invalid pairing endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// No response was obtained
    #[error("Transport {kind} failure: {source}")]
    Transport {
        kind: TransportKind,
        #[source]
        source: BoxError,
    },

    /// The service answered with an unexpected status
    #[error("{phase} rejected with HTTP {status}{}", reasons_suffix(.reasons))]
    Protocol {
        phase: PairingPhase,
        status: u16,
        reasons: Vec<String>,
    },

    /// The status matched but the body lacks the expected value
    #[error("Malformed {phase} response: {cause}")]
    MalformedResponse {
        phase: PairingPhase,
        cause: MalformedCause,
        raw_body: String,
    },

    /// Key pair or CSR generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    // =========================================================================
    // CERTIFICATE ERRORS
    // =========================================================================

    /// A certificate could not be decoded
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The certificate does not carry the public key of the device key
    #[error("Certificate public key does not match the device key")]
    CertificateMismatch,

    /// TLS configuration could not be built
    #[error("TLS configuration error: {0}")]
    Tls(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Device id is not 16 bytes of base64url
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    /// Failed to read or write a file
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type alias using PairingError
pub type PairingResult<T> = Result<T, PairingError>;

fn reasons_suffix(reasons: &[String]) -> String {
    if reasons.is_empty() {
        String::new()
    } else {
        format!(" ({})", reasons.join(", "))
    }
}

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<std::io::Error> for PairingError {
    fn from(err: std::io::Error) -> Self {
        PairingError::Io(err.to_string())
    }
}

impl From<rcgen::Error> for PairingError {
    fn from(err: rcgen::Error) -> Self {
        PairingError::KeyGeneration(err.to_string())
    }
}

impl From<serde_json::Error> for PairingError {
    fn from(err: serde_json::Error) -> Self {
        PairingError::Configuration(err.to_string())
    }
}

impl From<url::ParseError> for PairingError {
    fn from(err: url::ParseError) -> Self {
        PairingError::Configuration(format!("invalid URL: {err}"))
    }
}

impl From<toml::de::Error> for PairingError {
    fn from(err: toml::de::Error) -> Self {
        PairingError::Configuration(err.to_string())
    }
}

// =============================================================================
// ERROR CATEGORIES (for logging)
// =============================================================================

impl PairingError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PairingError::InvalidEndpoint { .. } => "endpoint",
            PairingError::Transport { .. } => "transport",
            PairingError::Protocol { .. } => "protocol",
            PairingError::MalformedResponse { .. } => "response",
            PairingError::KeyGeneration(_) => "crypto",

            PairingError::InvalidCertificate(_)
            | PairingError::CertificateMismatch
            | PairingError::Tls(_) => "tls",

            PairingError::Configuration(_)
            | PairingError::MissingEnvVar(_)
            | PairingError::InvalidDeviceId(_) => "config",

            PairingError::Io(_) => "storage",
        }
    }

    /// Check if repeating the failed call may succeed without side effects.
    ///
    /// Rejections are only retryable for read-only phases: a second
    /// registration or issuance attempt can change state on the service.
    pub fn is_retryable(&self) -> bool {
        match self {
            PairingError::Transport { .. } => true,
            PairingError::Protocol { phase, .. } => phase.is_read_only(),
            _ => false,
        }
    }

    /// Reason codes reported by the service, empty for other kinds
    pub fn reasons(&self) -> &[String] {
        match self {
            PairingError::Protocol { reasons, .. } => reasons,
            _ => &[],
        }
    }

    /// Phase that produced the error, if any
    pub fn phase(&self) -> Option<PairingPhase> {
        match self {
            PairingError::Protocol { phase, .. } | PairingError::MalformedResponse { phase, .. } => {
                Some(*phase)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error() -> PairingError {
        PairingError::Transport {
            kind: TransportKind::Connect,
            source: Box::new(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        }
    }

    #[test]
    fn test_error_category() {
        assert_eq!(transport_error().category(), "transport");

        let err = PairingError::KeyGeneration("test".into());
        assert_eq!(err.category(), "crypto");

        let err = PairingError::MissingEnvVar("ASTARTE_REALM".into());
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_is_retryable() {
        assert!(transport_error().is_retryable());

        let err = PairingError::Protocol {
            phase: PairingPhase::Register,
            status: 403,
            reasons: vec!["forbidden".into()],
        };
        assert!(!err.is_retryable());

        let err = PairingError::Protocol {
            phase: PairingPhase::ResolveBroker,
            status: 503,
            reasons: vec![],
        };
        assert!(err.is_retryable());

        let err = PairingError::MalformedResponse {
            phase: PairingPhase::ResolveBroker,
            cause: MalformedCause::InvalidJson("eof".into()),
            raw_body: String::new(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_protocol_message_lists_reasons() {
        let err = PairingError::Protocol {
            phase: PairingPhase::Register,
            status: 422,
            reasons: vec!["already_registered".into(), "invalid_hw_id".into()],
        };
        assert_eq!(
            err.to_string(),
            "register rejected with HTTP 422 (already_registered, invalid_hw_id)"
        );
        assert_eq!(err.reasons().len(), 2);
        assert_eq!(err.phase(), Some(PairingPhase::Register));

        let err = PairingError::Protocol {
            phase: PairingPhase::IssueCertificate,
            status: 500,
            reasons: vec![],
        };
        assert_eq!(err.to_string(), "issue_certificate rejected with HTTP 500");
    }

    #[test]
    fn test_transport_error_keeps_source() {
        use std::error::Error;
        let err = transport_error();
        assert!(err.source().is_some());
        assert!(err.phase().is_none());
    }
}
