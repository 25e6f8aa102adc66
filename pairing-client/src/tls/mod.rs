//! # TLS Hand-off
//!
//! Binds the key generated for the CSR to the certificate the pairing service
//! issued, and turns the pair into a `rustls` client configuration for the
//! telemetry transport.
//!
//! ## Flow
//!
//! ```text
//! issue_certificate ──> (DeviceKeyMaterial, DeviceCertificate)
//!                              │
//!                              ▼
//!                  TlsIdentity::new  (rejects mismatched pairs)
//!                              │
//!                              ▼
//!              TlsIdentity::client_config(roots) ──> rustls::ClientConfig
//! ```

use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use x509_parser::prelude::*;
use zeroize::Zeroizing;

use shared::{
    constants::MAX_CERT_SIZE,
    error::{PairingError, PairingResult},
    types::DeviceCertificate,
};

use crate::csr::DeviceKeyMaterial;

// =============================================================================
// CERTIFICATE DECODING
// =============================================================================

/// Decode the PEM certificate into DER
pub fn certificate_der(certificate: &DeviceCertificate) -> PairingResult<Vec<u8>> {
    let pem = certificate.as_pem();
    if pem.len() > MAX_CERT_SIZE {
        return Err(PairingError::InvalidCertificate(format!(
            "certificate too large: {} bytes (max {MAX_CERT_SIZE})",
            pem.len()
        )));
    }

    let (_, pem) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| PairingError::InvalidCertificate(format!("{:?}", e)))?;

    if pem.label != "CERTIFICATE" {
        return Err(PairingError::InvalidCertificate(format!(
            "unexpected PEM label '{}'",
            pem.label
        )));
    }

    Ok(pem.contents)
}

/// Raw subject public key of the certificate
pub fn certificate_public_key(certificate: &DeviceCertificate) -> PairingResult<Vec<u8>> {
    let der = certificate_der(certificate)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PairingError::InvalidCertificate(format!("{:?}", e)))?;

    Ok(cert.public_key().subject_public_key.data.to_vec())
}

/// Expiry of the certificate
pub fn certificate_not_after(certificate: &DeviceCertificate) -> PairingResult<DateTime<Utc>> {
    let der = certificate_der(certificate)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PairingError::InvalidCertificate(format!("{:?}", e)))?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        PairingError::InvalidCertificate(format!("expiry out of range: {timestamp}"))
    })
}

// =============================================================================
// CLIENT IDENTITY
// =============================================================================

/// Client certificate and matching private key for mutual TLS.
///
/// The private key is zeroized on drop.
#[derive(Clone)]
pub struct TlsIdentity {
    cert_der: CertificateDer<'static>,
    key_der: Zeroizing<Vec<u8>>,
    not_after: DateTime<Utc>,
}

impl TlsIdentity {
    /// Pair the key material with its issued certificate
    ///
    /// # Errors
    /// `CertificateMismatch` if the certificate carries another public key,
    /// `InvalidCertificate` if it cannot be decoded.
    pub fn new(
        key_material: &DeviceKeyMaterial,
        certificate: &DeviceCertificate,
    ) -> PairingResult<Self> {
        if !key_material.matches_certificate(certificate)? {
            return Err(PairingError::CertificateMismatch);
        }

        let not_after = certificate_not_after(certificate)?;
        let cert_der = CertificateDer::from(certificate_der(certificate)?);

        debug!(not_after = %not_after, "Bound device key to issued certificate");

        Ok(Self {
            cert_der,
            key_der: key_material.private_key_der(),
            not_after,
        })
    }

    pub fn certificate_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// Expiry of the client certificate
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Build a client configuration presenting this identity.
    ///
    /// `roots` are the trust anchors of the broker's server certificate.
    pub fn client_config(&self, roots: RootCertStore) -> PairingResult<ClientConfig> {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from((*self.key_der).clone()));

        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| PairingError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_client_auth_cert(vec![self.cert_der.clone()], key)
            .map_err(|e| PairingError::Tls(e.to_string()))
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("cert_len", &self.cert_der.len())
            .field("key_der", &"[REDACTED]")
            .field("not_after", &self.not_after)
            .finish()
    }
}
