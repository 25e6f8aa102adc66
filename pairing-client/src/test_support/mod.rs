//! Test doubles for the pairing service: a scripted in-memory transport and
//! an HTTP fake served by axum on a background tokio runtime.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rcgen::{BasicConstraints, CertificateParams, CertificateSigningRequestParams, IsCa, KeyPair};
use rustls::RootCertStore;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::{
    error::TransportKind,
    types::{ClientCertificateData, CsrData, DeviceCertificate, PairingRequest, RegisterDeviceData},
};

use crate::tls;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportFailure};

// =============================================================================
// SCRIPTED TRANSPORT
// =============================================================================

/// Transport answering with a fixed sequence of outcomes and recording requests
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<HttpResponse, TransportFailure>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportFailure::new(
                    TransportKind::Connect,
                    "no scripted response left",
                ))
            })
    }
}

// =============================================================================
// FAKE PAIRING SERVICE
// =============================================================================

struct ServiceState {
    realm: String,
    device_id: String,
    pairing_token: String,
    credentials_secret: String,
    ca_cert: rcgen::Certificate,
    ca_key: KeyPair,
    issued: Mutex<Vec<String>>,
    delay: Duration,
}

/// Pairing service for one device, signing CSRs with a throwaway CA
pub struct FakePairingService {
    runtime: Option<tokio::runtime::Runtime>,
    base_url: String,
    state: Arc<ServiceState>,
}

impl FakePairingService {
    pub const BROKER_URL: &'static str = "mqtts://broker.example.com:8883/";

    pub fn start(realm: &str, device_id: &str, pairing_token: &str) -> Self {
        Self::start_with_delay(realm, device_id, pairing_token, Duration::ZERO)
    }

    /// Start a service that waits `delay` before every answer
    pub fn start_with_delay(
        realm: &str,
        device_id: &str,
        pairing_token: &str,
        delay: Duration,
    ) -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["Fake Pairing CA".into()]).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = params.self_signed(&ca_key).unwrap();

        let state = Arc::new(ServiceState {
            realm: realm.into(),
            device_id: device_id.into(),
            pairing_token: pairing_token.into(),
            credentials_secret: format!("secret-{device_id}"),
            ca_cert,
            ca_key,
            issued: Mutex::new(Vec::new()),
            delay,
        });

        let app = Router::new()
            .route("/pairing/v1/:realm/agent/devices", post(register))
            .route("/pairing/v1/:realm/devices/:device_id", get(device_status))
            .route(
                "/pairing/v1/:realm/devices/:device_id/protocols/astarte_mqtt_v1/credentials",
                post(issue_certificate),
            )
            .route(
                "/pairing/v1/:realm/devices/:device_id/protocols/astarte_mqtt_v1/credentials/verify",
                post(verify_certificate),
            )
            .with_state(Arc::clone(&state));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            runtime: Some(runtime),
            base_url: format!("http://{addr}/pairing"),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials_secret(&self) -> &str {
        &self.state.credentials_secret
    }

    /// Trust store holding the service CA
    pub fn root_store(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.state.ca_cert.der().clone()).unwrap();
        roots
    }
}

impl Drop for FakePairingService {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

type Shared = State<Arc<ServiceState>>;

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"errors": {"error_name": ["forbidden"]}})),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errors": {"detail": "Not found"}})),
    )
        .into_response()
}

fn bearer_is(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

impl ServiceState {
    /// Common checks of the per-device routes
    async fn admit(&self, realm: &str, device_id: &str, headers: &HeaderMap) -> Option<Response> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if realm != self.realm || device_id != self.device_id {
            return Some(not_found());
        }
        if !bearer_is(headers, &self.credentials_secret) {
            return Some(forbidden());
        }
        None
    }
}

async fn register(
    State(state): Shared,
    Path(realm): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PairingRequest<RegisterDeviceData>>,
) -> Response {
    if realm != state.realm {
        return not_found();
    }
    if !bearer_is(&headers, &state.pairing_token) {
        return forbidden();
    }
    if body.data.hw_id != state.device_id {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": {"error_name": ["invalid_hw_id"]}})),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({"data": {"credentials_secret": state.credentials_secret}})),
    )
        .into_response()
}

async fn device_status(
    State(state): Shared,
    Path((realm, device_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = state.admit(&realm, &device_id, &headers).await {
        return rejection;
    }

    Json(json!({
        "data": {
            "version": "1.0.0",
            "status": "pending",
            "protocols": {
                "astarte_mqtt_v1": {"broker_url": FakePairingService::BROKER_URL}
            }
        }
    }))
    .into_response()
}

async fn issue_certificate(
    State(state): Shared,
    Path((realm, device_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<PairingRequest<CsrData>>,
) -> Response {
    if let Some(rejection) = state.admit(&realm, &device_id, &headers).await {
        return rejection;
    }

    let signed = CertificateSigningRequestParams::from_pem(&body.data.csr)
        .and_then(|csr| csr.signed_by(&state.ca_cert, &state.ca_key));

    match signed {
        Ok(cert) => {
            let pem = cert.pem();
            state.issued.lock().unwrap().push(pem.clone());
            (StatusCode::CREATED, Json(json!({"data": {"client_crt": pem}}))).into_response()
        }
        Err(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": {"error_name": ["invalid_csr"]}})),
        )
            .into_response(),
    }
}

async fn verify_certificate(
    State(state): Shared,
    Path((realm, device_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<PairingRequest<ClientCertificateData>>,
) -> Response {
    if let Some(rejection) = state.admit(&realm, &device_id, &headers).await {
        return rejection;
    }

    let timestamp = chrono::Utc::now().to_rfc3339();
    let known = state.issued.lock().unwrap().contains(&body.data.client_crt);
    let until = tls::certificate_not_after(&DeviceCertificate::from_pem(body.data.client_crt));

    let data = match (known, until) {
        (true, Ok(until)) => json!({
            "valid": true,
            "timestamp": timestamp,
            "until": until.to_rfc3339(),
        }),
        _ => json!({
            "valid": false,
            "timestamp": timestamp,
            "cause": "INVALID_ISSUER",
            "details": "certificate was not issued by this realm",
        }),
    };

    Json(json!({"data": data})).into_response()
}
