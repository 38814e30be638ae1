//! Validation Errors
//!
//! Field-scoped client input errors. The offending field is stored under the
//! `parameter` key of the details map so clients can highlight it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{codes, Detail, StructuredError};

const PARAMETER_KEY: &str = "parameter";
const REASON_KEY: &str = "reason";

/// A client input error with a free-form details map.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    details: Map<String, Value>,
    #[serde(skip)]
    description: String,
}

impl ValidationError {
    /// A field in the request has an invalid value.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert(PARAMETER_KEY.to_string(), Value::String(field.into()));
        details.insert(REASON_KEY.to_string(), Value::String(reason.into()));
        Self {
            code: codes::VALIDATION_FAILED.to_string(),
            message: "A parameter has invalid value".to_string(),
            details,
            description: "Validation Error".to_string(),
        }
    }

    /// A required field is missing or empty.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert(PARAMETER_KEY.to_string(), Value::String(field.into()));
        Self {
            code: codes::MISSING_FIELD.to_string(),
            message: "At least one required parameter is missing".to_string(),
            details,
            description: "Validation Error".to_string(),
        }
    }

    /// The request payload could not be parsed.
    pub fn malformed_request(reason: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert(REASON_KEY.to_string(), Value::String(reason.into()));
        Self {
            code: codes::MALFORMED_REQUEST.to_string(),
            message: "Request payload is invalid or malformed".to_string(),
            details,
            description: "Malformed Request".to_string(),
        }
    }

    /// A validation error with a caller-chosen message and no details.
    pub fn custom(message: impl Into<String>) -> Self {
        Self {
            code: codes::VALIDATION_FAILED.to_string(),
            message: message.into(),
            details: Map::new(),
            description: "Validation Error".to_string(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The offending field, if the error is scoped to one.
    pub fn parameter(&self) -> Option<&str> {
        self.details.get(PARAMETER_KEY).and_then(Value::as_str)
    }

    fn reason(&self) -> Option<&str> {
        self.details.get(REASON_KEY).and_then(Value::as_str)
    }

    /// Returns `code:parameter` when a parameter is present, else `code`.
    pub fn error_code(&self) -> String {
        match self.parameter() {
            Some(parameter) => format!("{}:{}", self.code, parameter),
            None => self.code.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        codes::http_status(&self.code)
    }
}

impl From<ValidationError> for StructuredError {
    fn from(err: ValidationError) -> Self {
        let detail = match (err.parameter(), err.reason()) {
            (None, None) => None,
            (parameter, reason) => Some(
                Detail::new("", parameter.unwrap_or_default())
                    .message(reason.unwrap_or_default()),
            ),
        };
        let builder = StructuredError::with_code(err.code.clone());
        let builder = match detail {
            Some(detail) => builder.with_details([detail]),
            None => builder,
        };
        builder.build(err.message)
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
