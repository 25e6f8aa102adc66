//! # Key/CSR Generator
//!
//! Generates the device key pair and the PKCS#10 certificate signing request
//! submitted during certificate issuance. Every call produces a fresh key;
//! nothing is cached or reused.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, KeyPair, SignatureAlgorithm,
    PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384,
};
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

use shared::{
    error::PairingResult,
    types::{DeviceCertificate, KeyAlgorithm},
};

use crate::endpoint::PairingEndpoint;
use crate::tls;

/// A freshly generated private key together with its PEM-encoded CSR
pub struct DeviceKeyMaterial {
    key_pair: KeyPair,
    csr_pem: String,
    algorithm: KeyAlgorithm,
}

impl DeviceKeyMaterial {
    /// PEM-encoded PKCS#10 request
    pub fn csr_pem(&self) -> &str {
        &self.csr_pem
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// PKCS#8 PEM export of the private key, wiped on drop
    pub fn private_key_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(self.key_pair.serialize_pem())
    }

    /// PKCS#8 DER export of the private key, wiped on drop
    pub fn private_key_der(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.key_pair.serialize_der())
    }

    /// Raw public key (uncompressed EC point)
    pub fn public_key_raw(&self) -> &[u8] {
        self.key_pair.public_key_raw()
    }

    /// Check whether a certificate was issued for this key
    pub fn matches_certificate(&self, certificate: &DeviceCertificate) -> PairingResult<bool> {
        let public_key = tls::certificate_public_key(certificate)?;
        Ok(public_key.as_slice() == self.public_key_raw())
    }
}

impl fmt::Debug for DeviceKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("private_key", &"[REDACTED]")
            .field("csr_len", &self.csr_pem.len())
            .finish()
    }
}

/// CSR generator bound to an algorithm and a subject common name
#[derive(Debug, Clone)]
pub struct CsrGenerator {
    algorithm: KeyAlgorithm,
    common_name: String,
}

impl CsrGenerator {
    pub fn new(algorithm: KeyAlgorithm, common_name: impl Into<String>) -> Self {
        Self {
            algorithm,
            common_name: common_name.into(),
        }
    }

    /// Generator whose subject is `{realm}/{device_id}`
    pub fn for_endpoint(endpoint: &PairingEndpoint, algorithm: KeyAlgorithm) -> Self {
        Self::new(
            algorithm,
            format!("{}/{}", endpoint.realm(), endpoint.device_id()),
        )
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// Generate a new key pair and its CSR
    pub fn generate(&self) -> PairingResult<DeviceKeyMaterial> {
        generate(self.algorithm, &self.common_name)
    }
}

/// Generate a key pair of the given algorithm and a CSR for `common_name`
pub fn generate(algorithm: KeyAlgorithm, common_name: &str) -> PairingResult<DeviceKeyMaterial> {
    let key_pair = KeyPair::generate_for(signature_algorithm(algorithm))?;

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, common_name);

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;

    let csr_pem = params.serialize_request(&key_pair)?.pem()?;

    debug!(algorithm = %algorithm, subject = %common_name, "Generated device key and CSR");

    Ok(DeviceKeyMaterial {
        key_pair,
        csr_pem,
        algorithm,
    })
}

fn signature_algorithm(algorithm: KeyAlgorithm) -> &'static SignatureAlgorithm {
    match algorithm {
        KeyAlgorithm::EcdsaP256 => &PKCS_ECDSA_P256_SHA256,
        KeyAlgorithm::EcdsaP384 => &PKCS_ECDSA_P384_SHA384,
    }
}
