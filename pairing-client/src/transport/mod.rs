//! # HTTP Transport
//!
//! The HTTP capability the credential client consumes: one blocking request
//! in, a status and body (or a transport failure) out. [`ReqwestTransport`]
//! is the production implementation; tests substitute scripted transports.

use reqwest::header::ACCEPT;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;
use zeroize::Zeroizing;

use shared::{
    error::{BoxError, PairingError, PairingResult, TransportKind},
    types::HttpMethod,
};

/// A request to the pairing service
#[derive(Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: HttpMethod,

    /// Fully resolved request URL
    pub url: Url,

    /// Bearer credential sent in the `Authorization` header
    pub bearer: Zeroizing<String>,

    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<serde_json::Value>,

    /// Deadline for the whole round trip
    pub timeout: Duration,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer", &"[REDACTED]")
            .field("body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A response obtained from the pairing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A request that produced no response
#[derive(Error, Debug)]
#[error("{kind} failure: {source}")]
pub struct TransportFailure {
    pub kind: TransportKind,
    #[source]
    pub source: BoxError,
}

impl TransportFailure {
    pub fn new(kind: TransportKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }
}

impl From<TransportFailure> for PairingError {
    fn from(failure: TransportFailure) -> Self {
        PairingError::Transport {
            kind: failure.kind,
            source: failure.source,
        }
    }
}

/// Blocking HTTP capability used by the credential client
pub trait HttpTransport: Send + Sync {
    /// Perform one round trip
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        (**self).send(request)
    }
}

/// HTTP transport backed by a blocking `reqwest` client over rustls
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport; `ignore_tls_errors` accepts any server certificate
    pub fn new(ignore_tls_errors: bool) -> PairingResult<Self> {
        if ignore_tls_errors {
            warn!("TLS verification of the pairing service is disabled");
        }

        let client = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(ignore_tls_errors)
            .user_agent(format!("pairing-client/{}", shared::VERSION))
            .build()
            .map_err(|e| PairingError::Tls(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let HttpRequest {
            method,
            url,
            bearer,
            body,
            timeout,
        } = request;

        let method = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(bearer.as_str())
            .header(ACCEPT, "application/json")
            .timeout(timeout);

        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;

        Ok(HttpResponse { status, body })
    }
}

/// Map a reqwest error to the stage it failed at
fn classify(err: reqwest::Error) -> TransportFailure {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else if err.is_connect() {
        TransportKind::Connect
    } else {
        TransportKind::Request
    };
    TransportFailure::new(kind, err)
}
