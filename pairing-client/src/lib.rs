//! # Device Pairing Client
//!
//! This crate provides the device side of the pairing (trust-bootstrap)
//! sequence:
//! - Registration of the device with a pairing token
//! - Resolution of the MQTT broker address
//! - Key generation and certificate issuance through a CSR
//! - Certificate verification
//! - Hand-off of the issued identity to a `rustls` client configuration
//!
//! ## Example
//!
//! ```no_run
//! use pairing_client::PairingClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PairingClient::new("https://api.example.com/pairing", "myrealm", "2TBn-jNESuuHamE2Zo1anA")?;
//!
//! let secret = client.register("pairing-jwt", None)?;
//! let broker = client.resolve_broker(&secret, None)?;
//! let (key, certificate) = client.issue_certificate(&secret, None)?;
//! let validity = client.verify_certificate(&certificate, &secret, None)?;
//! # let _ = (broker, key, validity);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod csr;
pub mod device_id;
pub mod endpoint;
pub mod response;
pub mod tls;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use client::{PairingClient, PairingOutcome};
pub use csr::{CsrGenerator, DeviceKeyMaterial};
pub use device_id::DeviceId;
pub use endpoint::PairingEndpoint;
pub use tls::TlsIdentity;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};
