//! # Response Interpreter
//!
//! Turns the outcome of one pairing request into either the value the phase
//! needs or exactly one typed error:
//!
//! 1. no response at all → `Transport`
//! 2. unexpected status → `Protocol`, with the service's reason codes
//! 3. unusable body → `MalformedResponse`, keeping the raw body
//!
//! Field extraction never panics: a missing key or a value of the wrong JSON
//! type comes back as a [`MalformedCause`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use shared::{
    constants::{field_path_display, FIELD_ERROR_NAME},
    error::{MalformedCause, PairingError, PairingResult},
    types::PairingPhase,
};

use crate::transport::{HttpResponse, TransportFailure};

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A value that can be read out of a JSON response field
pub trait FieldValue: Sized {
    /// Description of the JSON type, used in error messages
    const EXPECTED: &'static str;

    fn from_json(value: &Value) -> Option<Self>;
}

impl FieldValue for String {
    const EXPECTED: &'static str = "a string";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FieldValue for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for DateTime<Utc> {
    const EXPECTED: &'static str = "an RFC 3339 timestamp";

    fn from_json(value: &Value) -> Option<Self> {
        value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// =============================================================================
// SUCCESS BODY
// =============================================================================

/// Parsed body of a response whose status matched the phase
#[derive(Debug, Clone)]
pub struct SuccessBody {
    phase: PairingPhase,
    raw: String,
    json: Value,
}

impl SuccessBody {
    /// Parse a success body as JSON
    pub fn parse(phase: PairingPhase, raw: String) -> PairingResult<Self> {
        match serde_json::from_str(&raw) {
            Ok(json) => Ok(Self { phase, raw, json }),
            Err(e) => Err(PairingError::MalformedResponse {
                phase,
                cause: MalformedCause::InvalidJson(e.to_string()),
                raw_body: raw,
            }),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    /// Extract a required field
    pub fn field<T: FieldValue>(&self, path: &[&str]) -> PairingResult<T> {
        match self.lookup(path)? {
            Some(value) => self.convert(path, value),
            None => Err(self.malformed(MalformedCause::MissingField {
                path: field_path_display(path),
            })),
        }
    }

    /// Extract a field that may be absent; `null` counts as absent
    pub fn optional_field<T: FieldValue>(&self, path: &[&str]) -> PairingResult<Option<T>> {
        match self.lookup(path)? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => self.convert(path, value).map(Some),
        }
    }

    /// Walk the path; `Ok(None)` when a key is absent
    fn lookup(&self, path: &[&str]) -> PairingResult<Option<&Value>> {
        let mut current = &self.json;

        for (depth, key) in path.iter().enumerate() {
            let object = current.as_object().ok_or_else(|| {
                let parent = if depth == 0 {
                    "(body)".to_string()
                } else {
                    field_path_display(&path[..depth])
                };
                self.malformed(MalformedCause::UnexpectedType {
                    path: parent,
                    expected: "an object",
                })
            })?;

            match object.get(*key) {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }

    fn convert<T: FieldValue>(&self, path: &[&str], value: &Value) -> PairingResult<T> {
        T::from_json(value).ok_or_else(|| {
            self.malformed(MalformedCause::UnexpectedType {
                path: field_path_display(path),
                expected: T::EXPECTED,
            })
        })
    }

    fn malformed(&self, cause: MalformedCause) -> PairingError {
        PairingError::MalformedResponse {
            phase: self.phase,
            cause,
            raw_body: self.raw.clone(),
        }
    }
}

// =============================================================================
// INTERPRETATION
// =============================================================================

/// Classify a request outcome, returning the body of an expected response
pub fn check_status(
    phase: PairingPhase,
    outcome: Result<HttpResponse, TransportFailure>,
) -> PairingResult<SuccessBody> {
    let response = outcome?;

    if response.status != phase.expected_status() {
        return Err(PairingError::Protocol {
            phase,
            status: response.status,
            reasons: error_reasons(&response.body),
        });
    }

    SuccessBody::parse(phase, response.body)
}

/// Reason codes of a rejected request, read from `errors.error_name`
///
/// A lone string counts as a single reason. Any other shape, including a
/// body that is not JSON, yields no reasons.
pub fn error_reasons(body: &str) -> Vec<String> {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let mut current = &json;
    for key in FIELD_ERROR_NAME {
        match current.get(*key) {
            Some(value) => current = value,
            None => return Vec::new(),
        }
    }

    match current {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        Value::String(reason) => vec![reason.clone()],
        _ => Vec::new(),
    }
}

/// Interpret an outcome and extract the phase's value
pub fn interpret<T: FieldValue>(
    phase: PairingPhase,
    outcome: Result<HttpResponse, TransportFailure>,
) -> PairingResult<T> {
    check_status(phase, outcome)?.field(phase.field())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::TransportKind;

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportFailure> {
        Ok(HttpResponse::new(status, body))
    }

    #[test]
    fn test_register_secret() {
        let secret: String = interpret(
            PairingPhase::Register,
            ok(201, r#"{"data":{"credentials_secret":"abc123"}}"#),
        )
        .unwrap();
        assert_eq!(secret, "abc123");
    }

    #[test]
    fn test_broker_url() {
        let broker: String = interpret(
            PairingPhase::ResolveBroker,
            ok(
                200,
                r#"{"data":{"protocols":{"astarte_mqtt_v1":{"broker_url":"mqtts://b:8883"}}}}"#,
            ),
        )
        .unwrap();
        assert_eq!(broker, "mqtts://b:8883");
    }

    #[test]
    fn test_forbidden_registration() {
        let err = interpret::<String>(
            PairingPhase::Register,
            ok(403, r#"{"errors":{"error_name":["forbidden"]}}"#),
        )
        .unwrap_err();

        match err {
            PairingError::Protocol {
                phase,
                status,
                reasons,
            } => {
                assert_eq!(phase, PairingPhase::Register);
                assert_eq!(status, 403);
                assert_eq!(reasons, vec!["forbidden".to_string()]);
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_status_mismatch_even_if_2xx() {
        // Registration must answer 201; a 200 is a rejection
        let err = interpret::<String>(
            PairingPhase::Register,
            ok(200, r#"{"data":{"credentials_secret":"abc123"}}"#),
        )
        .unwrap_err();
        assert!(matches!(err, PairingError::Protocol { status: 200, .. }));
    }

    #[test]
    fn test_missing_field_keeps_raw_body() {
        let cases = [
            (PairingPhase::Register, 201, r#"{"data":{}}"#),
            (PairingPhase::ResolveBroker, 200, r#"{"data":{"protocols":{}}}"#),
            (PairingPhase::IssueCertificate, 201, r#"{"data": {"other": 1}}"#),
            (PairingPhase::VerifyCertificate, 200, "{}"),
        ];

        for (phase, status, body) in cases {
            let err = match phase {
                PairingPhase::VerifyCertificate => interpret::<bool>(phase, ok(status, body)).unwrap_err(),
                _ => interpret::<String>(phase, ok(status, body)).unwrap_err(),
            };

            match err {
                PairingError::MalformedResponse {
                    phase: got,
                    cause,
                    raw_body,
                } => {
                    assert_eq!(got, phase);
                    assert_eq!(raw_body, body);
                    assert!(matches!(cause, MalformedCause::MissingField { .. }), "{cause:?}");
                }
                other => panic!("{phase}: expected malformed response, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_json() {
        let body = "<html>gateway</html>";
        let err = interpret::<String>(PairingPhase::Register, ok(201, body)).unwrap_err();
        match err {
            PairingError::MalformedResponse { cause, raw_body, .. } => {
                assert!(matches!(cause, MalformedCause::InvalidJson(_)));
                assert_eq!(raw_body, body);
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_types() {
        let err = interpret::<bool>(
            PairingPhase::VerifyCertificate,
            ok(200, r#"{"data":{"valid":"yes"}}"#),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PairingError::MalformedResponse {
                cause: MalformedCause::UnexpectedType { ref path, expected: "a boolean" },
                ..
            } if path == "data.valid"
        ));

        let err = interpret::<String>(PairingPhase::Register, ok(201, r#"{"data":[1,2]}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            PairingError::MalformedResponse {
                cause: MalformedCause::UnexpectedType { ref path, expected: "an object" },
                ..
            } if path == "data"
        ));

        let err = interpret::<String>(PairingPhase::Register, ok(201, "[]")).unwrap_err();
        assert!(matches!(
            err,
            PairingError::MalformedResponse {
                cause: MalformedCause::UnexpectedType { ref path, .. },
                ..
            } if path == "(body)"
        ));
    }

    #[test]
    fn test_error_reasons_shapes() {
        assert_eq!(
            error_reasons(r#"{"errors":{"error_name":["a","b"]}}"#),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            error_reasons(r#"{"errors":{"error_name":"unauthorized"}}"#),
            vec!["unauthorized".to_string()]
        );
        assert!(error_reasons(r#"{"errors":{"detail":"Not found"}}"#).is_empty());
        assert!(error_reasons(r#"{"errors":{"error_name":42}}"#).is_empty());
        assert!(error_reasons("Internal Server Error").is_empty());
        assert!(error_reasons("").is_empty());
    }

    #[test]
    fn test_server_error_with_text_body() {
        let err = interpret::<String>(
            PairingPhase::IssueCertificate,
            ok(500, "Internal Server Error"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PairingError::Protocol { status: 500, ref reasons, .. } if reasons.is_empty()
        ));
    }

    #[test]
    fn test_transport_failure_passes_through() {
        let outcome = Err(TransportFailure::new(
            TransportKind::Connect,
            std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        ));
        let err = interpret::<String>(PairingPhase::ResolveBroker, outcome).unwrap_err();
        assert!(matches!(
            err,
            PairingError::Transport {
                kind: TransportKind::Connect,
                ..
            }
        ));
    }

    #[test]
    fn test_optional_fields() {
        let body = SuccessBody::parse(
            PairingPhase::VerifyCertificate,
            r#"{"data":{"valid":true,"until":"2030-01-01T00:00:00Z","cause":null}}"#.into(),
        )
        .unwrap();

        let until: Option<DateTime<Utc>> = body.optional_field(&["data", "until"]).unwrap();
        assert_eq!(until.map(|t| t.timestamp()), Some(1_893_456_000));

        let cause: Option<String> = body.optional_field(&["data", "cause"]).unwrap();
        assert!(cause.is_none());

        let details: Option<String> = body.optional_field(&["data", "details"]).unwrap();
        assert!(details.is_none());

        assert!(body
            .optional_field::<DateTime<Utc>>(&["data", "valid"])
            .is_err());
        assert_eq!(body.json()["data"]["valid"], Value::Bool(true));
        assert!(body.raw().contains("2030"));
    }
}
