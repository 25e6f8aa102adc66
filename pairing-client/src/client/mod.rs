//! # Credential Client
//!
//! Sequences the pairing phases against the pairing service. Each phase is
//! an independent blocking call; values flow between phases through the
//! caller:
//!
//! ```text
//! register(token)            -> CredentialSecret
//! resolve_broker(secret)     -> BrokerAddress
//! issue_certificate(secret)  -> (DeviceKeyMaterial, DeviceCertificate)
//! verify_certificate(cert)   -> CertificateValidity
//! ```
//!
//! The client holds no mutable state and never retries. A `None` or zero
//! timeout means the configured default.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use zeroize::Zeroizing;

use shared::{
    config::PairingConfig,
    constants::*,
    error::{PairingResult, TransportKind},
    types::*,
};

use crate::csr::{CsrGenerator, DeviceKeyMaterial};
use crate::endpoint::PairingEndpoint;
use crate::response::{self, SuccessBody};
use crate::tls::TlsIdentity;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};

/// Everything a full pairing run produces
#[derive(Debug)]
pub struct PairingOutcome {
    pub credential_secret: CredentialSecret,
    pub broker: BrokerAddress,
    pub key_material: DeviceKeyMaterial,
    pub certificate: DeviceCertificate,
    pub validity: CertificateValidity,
}

impl PairingOutcome {
    /// Bind the issued certificate to its key for the telemetry transport
    pub fn tls_identity(&self) -> PairingResult<TlsIdentity> {
        TlsIdentity::new(&self.key_material, &self.certificate)
    }
}

/// Pairing client of one device
#[derive(Debug, Clone)]
pub struct PairingClient<T = ReqwestTransport> {
    endpoint: PairingEndpoint,
    transport: T,
    default_timeout: Duration,
    key_algorithm: KeyAlgorithm,
}

impl PairingClient<ReqwestTransport> {
    /// Create a client over the default HTTP transport
    ///
    /// # Errors
    /// `InvalidEndpoint` if the base URL cannot form request URLs. No request
    /// is made.
    pub fn new(
        base_url: &str,
        realm: impl Into<String>,
        device_id: impl Into<String>,
    ) -> PairingResult<Self> {
        let endpoint = PairingEndpoint::new(base_url, realm, device_id)?;
        Ok(Self::with_endpoint(endpoint, ReqwestTransport::new(false)?))
    }

    /// Create a client from a loaded configuration
    pub fn from_config(config: &PairingConfig) -> PairingResult<Self> {
        let endpoint = PairingEndpoint::from_config(config)?;
        let transport = ReqwestTransport::new(config.ignore_tls_errors)?;

        Ok(Self::with_endpoint(endpoint, transport)
            .with_default_timeout(config.request_timeout())
            .with_key_algorithm(config.key_algorithm))
    }
}

impl<T: HttpTransport> PairingClient<T> {
    /// Create a client over any transport
    pub fn with_endpoint(endpoint: PairingEndpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport,
            default_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            key_algorithm: KeyAlgorithm::default(),
        }
    }

    /// Replace the transport, keeping the endpoint and settings
    pub fn with_transport<U: HttpTransport>(self, transport: U) -> PairingClient<U> {
        PairingClient {
            endpoint: self.endpoint,
            transport,
            default_timeout: self.default_timeout,
            key_algorithm: self.key_algorithm,
        }
    }

    /// Set the timeout used when a call passes none; zero restores the default
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = if timeout.is_zero() {
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
        } else {
            timeout
        };
        self
    }

    pub fn with_key_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = algorithm;
        self
    }

    pub fn endpoint(&self) -> &PairingEndpoint {
        &self.endpoint
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // =========================================================================
    // PAIRING PHASES
    // =========================================================================

    /// Exchange the pairing token for the device's credentials secret
    pub fn register(
        &self,
        pairing_token: &str,
        timeout: Option<Duration>,
    ) -> PairingResult<CredentialSecret> {
        let phase = PairingPhase::Register;
        info!(
            realm = %self.endpoint.realm(),
            device_id = %self.endpoint.device_id(),
            "Registering device"
        );

        let body = PairingRequest::new(RegisterDeviceData {
            hw_id: self.endpoint.device_id().to_string(),
        });
        let outcome = self.send(phase, pairing_token, Some(&body), timeout);
        let secret: String = response::interpret(phase, outcome)?;

        info!(secret_len = secret.len(), "Device registered");
        Ok(CredentialSecret::new(secret))
    }

    /// Look up the MQTT broker of the device
    pub fn resolve_broker(
        &self,
        credential_secret: &CredentialSecret,
        timeout: Option<Duration>,
    ) -> PairingResult<BrokerAddress> {
        let phase = PairingPhase::ResolveBroker;
        info!(device_id = %self.endpoint.device_id(), "Resolving broker");

        let outcome = self.send::<()>(phase, credential_secret.expose_secret(), None, timeout);
        let broker: String = response::interpret(phase, outcome)?;

        info!(broker = %broker, "Broker resolved");
        Ok(BrokerAddress::new(broker))
    }

    /// Generate a fresh key and have the service sign it.
    ///
    /// The returned key material is the one whose CSR was submitted; it is
    /// not kept by the client.
    pub fn issue_certificate(
        &self,
        credential_secret: &CredentialSecret,
        timeout: Option<Duration>,
    ) -> PairingResult<(DeviceKeyMaterial, DeviceCertificate)> {
        let phase = PairingPhase::IssueCertificate;
        info!(
            device_id = %self.endpoint.device_id(),
            algorithm = %self.key_algorithm,
            "Requesting client certificate"
        );

        let key_material = CsrGenerator::for_endpoint(&self.endpoint, self.key_algorithm).generate()?;

        let body = PairingRequest::new(CsrData {
            csr: key_material.csr_pem().to_string(),
        });
        let outcome = self.send(phase, credential_secret.expose_secret(), Some(&body), timeout);
        let pem: String = response::interpret(phase, outcome)?;

        info!(cert_len = pem.len(), "Client certificate issued");
        Ok((key_material, DeviceCertificate::from_pem(pem)))
    }

    /// Ask the service whether a client certificate is valid
    pub fn verify_certificate(
        &self,
        certificate: &DeviceCertificate,
        credential_secret: &CredentialSecret,
        timeout: Option<Duration>,
    ) -> PairingResult<CertificateValidity> {
        let phase = PairingPhase::VerifyCertificate;
        info!(device_id = %self.endpoint.device_id(), "Verifying client certificate");

        let body = PairingRequest::new(ClientCertificateData {
            client_crt: certificate.as_pem().to_string(),
        });
        let outcome = self.send(phase, credential_secret.expose_secret(), Some(&body), timeout);
        let validity = read_validity(response::check_status(phase, outcome)?)?;

        info!(
            valid = validity.valid,
            until = ?validity.until,
            cause = ?validity.cause,
            "Certificate verified"
        );
        Ok(validity)
    }

    /// Run all four phases in order, stopping at the first failure
    pub fn bootstrap(
        &self,
        pairing_token: &str,
        timeout: Option<Duration>,
    ) -> PairingResult<PairingOutcome> {
        let credential_secret = self.register(pairing_token, timeout)?;
        let broker = self.resolve_broker(&credential_secret, timeout)?;
        let (key_material, certificate) = self.issue_certificate(&credential_secret, timeout)?;
        let validity = self.verify_certificate(&certificate, &credential_secret, timeout)?;

        Ok(PairingOutcome {
            credential_secret,
            broker,
            key_material,
            certificate,
            validity,
        })
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn effective_timeout(&self, timeout: Option<Duration>) -> Duration {
        match timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => self.default_timeout,
        }
    }

    fn send<B: Serialize>(
        &self,
        phase: PairingPhase,
        bearer: &str,
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportFailure> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| TransportFailure::new(TransportKind::Request, e))?;

        let request = HttpRequest {
            method: phase.method(),
            url: self.endpoint.url_for(phase),
            bearer: Zeroizing::new(bearer.to_string()),
            body,
            timeout: self.effective_timeout(timeout),
        };

        debug!(
            phase = %phase,
            method = %request.method,
            url = %request.url,
            timeout_ms = request.timeout.as_millis() as u64,
            "Sending pairing request"
        );

        let outcome = self.transport.send(request);

        match &outcome {
            Ok(response) => debug!(
                phase = %phase,
                status = response.status,
                body_len = response.body.len(),
                "Received pairing response"
            ),
            Err(failure) => debug!(phase = %phase, kind = %failure.kind, "Pairing request failed"),
        }

        outcome
    }
}

/// Read the validity flag and the optional details of a verify response
fn read_validity(body: SuccessBody) -> PairingResult<CertificateValidity> {
    Ok(CertificateValidity {
        valid: body.field(FIELD_VALID)?,
        timestamp: body.optional_field(FIELD_VERIFY_TIMESTAMP)?,
        until: body.optional_field(FIELD_VERIFY_UNTIL)?,
        cause: body.optional_field(FIELD_VERIFY_CAUSE)?,
        details: body.optional_field(FIELD_VERIFY_DETAILS)?,
    })
}
