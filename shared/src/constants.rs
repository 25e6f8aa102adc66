//! # Constants for the Device Pairing Client
//!
//! Wire-level constants of the pairing API plus the defaults and environment
//! variable names used by the configuration layer.

// =============================================================================
// PAIRING API
// =============================================================================

/// API version prefix of every pairing route
pub const PAIRING_API_VERSION: &str = "v1";

/// Protocol name under which the MQTT transport credentials live
pub const MQTT_PROTOCOL: &str = "astarte_mqtt_v1";

/// Path segments of the agent registration route, after the realm
pub const REGISTRATION_SEGMENTS: &[&str] = &["agent", "devices"];

/// Path segment of the per-device routes, after the realm
pub const DEVICES_SEGMENT: &str = "devices";

/// Path segments of the credentials route, after the device id
pub const CREDENTIALS_SEGMENTS: &[&str] = &["protocols", MQTT_PROTOCOL, "credentials"];

/// Path segment of the certificate verification route
pub const VERIFY_SEGMENT: &str = "verify";

/// Success status of the registration phase
pub const STATUS_CREATED: u16 = 201;

/// Success status of the read phases
pub const STATUS_OK: u16 = 200;

// =============================================================================
// RESPONSE FIELDS
// =============================================================================

/// Field holding the credentials secret in the registration response
pub const FIELD_CREDENTIALS_SECRET: &[&str] = &["data", "credentials_secret"];

/// Field holding the broker URL in the device status response
pub const FIELD_BROKER_URL: &[&str] = &["data", "protocols", MQTT_PROTOCOL, "broker_url"];

/// Field holding the signed certificate in the credentials response
pub const FIELD_CLIENT_CRT: &[&str] = &["data", "client_crt"];

/// Field holding the validity flag in the verification response
pub const FIELD_VALID: &[&str] = &["data", "valid"];

/// Optional verification fields
pub const FIELD_VERIFY_TIMESTAMP: &[&str] = &["data", "timestamp"];
pub const FIELD_VERIFY_UNTIL: &[&str] = &["data", "until"];
pub const FIELD_VERIFY_CAUSE: &[&str] = &["data", "cause"];
pub const FIELD_VERIFY_DETAILS: &[&str] = &["data", "details"];

/// Field holding the reason codes of a rejected request
pub const FIELD_ERROR_NAME: &[&str] = &["errors", "error_name"];

// =============================================================================
// DEFAULTS
// =============================================================================

/// Pairing service of a local development deployment
pub const DEFAULT_PAIRING_URL: &str = "http://localhost:4003";

/// Per-request timeout used when the caller passes none (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Length of an encoded device id (16 bytes, base64url without padding)
pub const DEVICE_ID_LENGTH: usize = 22;

/// Raw size of a device id
pub const DEVICE_ID_BYTES: usize = 16;

/// Maximum accepted certificate size when decoding PEM
pub const MAX_CERT_SIZE: usize = 16 * 1024;

// =============================================================================
// ENVIRONMENT VARIABLE NAMES
// =============================================================================

/// Environment variable for the pairing base URL
pub const ENV_PAIRING_URL: &str = "ASTARTE_PAIRING_URL";

/// Environment variable for the realm
pub const ENV_REALM: &str = "ASTARTE_REALM";

/// Environment variable for the device id
pub const ENV_DEVICE_ID: &str = "ASTARTE_DEVICE_ID";

/// Environment variable for the pairing token (JWT)
pub const ENV_PAIRING_TOKEN: &str = "ASTARTE_PAIRING_TOKEN";

/// Environment variable for the request timeout in milliseconds
pub const ENV_REQUEST_TIMEOUT_MS: &str = "ASTARTE_REQUEST_TIMEOUT_MS";

/// Environment variable to skip TLS verification of the pairing service
pub const ENV_IGNORE_TLS_ERRORS: &str = "ASTARTE_IGNORE_TLS_ERRORS";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Render a field path the way it appears in error messages (`data.valid`)
pub fn field_path_display(path: &[&str]) -> String {
    path.join(".")
}
