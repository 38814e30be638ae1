//! Error Codes
//!
//! Stable, machine-readable error codes and their HTTP status table.
//!
//! Codes are strings rather than integers so services can add their own
//! descriptive codes next to the shared ones.

use axum::http::StatusCode;

pub const BAD_REQUEST: &str = "bad_request";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const FORBIDDEN: &str = "forbidden";
pub const NOT_FOUND: &str = "not_found";
pub const RESOURCE_NOT_FOUND: &str = "resource_not_found";
pub const CONFLICT: &str = "conflict";
pub const INTERNAL: &str = "internal";
pub const CACHE_MISS: &str = "cache_miss";

// Validation codes
pub const VALIDATION_FAILED: &str = "validation_failed";
pub const MISSING_FIELD: &str = "missing_field";
pub const MALFORMED_REQUEST: &str = "malformed_request";

/// Code to status table. Anything not listed maps to 500.
const CODE_TO_STATUS: &[(&str, StatusCode)] = &[
    (BAD_REQUEST, StatusCode::BAD_REQUEST),
    (VALIDATION_FAILED, StatusCode::BAD_REQUEST),
    (MISSING_FIELD, StatusCode::BAD_REQUEST),
    (MALFORMED_REQUEST, StatusCode::BAD_REQUEST),
    (UNAUTHORIZED, StatusCode::UNAUTHORIZED),
    (FORBIDDEN, StatusCode::FORBIDDEN),
    (NOT_FOUND, StatusCode::NOT_FOUND),
    (RESOURCE_NOT_FOUND, StatusCode::NOT_FOUND),
    (CONFLICT, StatusCode::CONFLICT),
];

// == HTTP Status ==
/// Returns the HTTP status for an error code.
///
/// Unknown codes, `internal` and `cache_miss` all map to
/// `500 Internal Server Error`.
pub fn http_status(code: &str) -> StatusCode {
    CODE_TO_STATUS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, status)| *status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
