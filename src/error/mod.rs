//! Structured Errors
//!
//! A closed taxonomy of error kinds shared by the cache client, the rate
//! limiter and the HTTP boundary. Every error carries a stable `code`, a
//! client-facing `message`, optional `details`, and an internal description
//! and cause that are logged but never serialized.

pub mod codes;
mod validation;

use std::error::Error as StdError;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub use validation::ValidationError;

/// Boxed cause carried inside a [`StructuredError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, StructuredError>;

// == Detail ==
/// One entry of a validation-style error payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detail {
    /// Resource which has the error
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource: String,
    /// The specific field of the resource which has the error
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field: String,
    /// The value of the field which was erroneous
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    /// Message for this error
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Detail {
    pub fn new(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            field: field.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

// == Structured Error ==
/// Error value with a machine-readable code and a client-safe message.
///
/// Values are immutable once returned to a caller. Wrapping produces a new
/// error whose [`source`](StdError::source) is the wrapped one, so the chain
/// can be walked down to [`root_cause`](StructuredError::root_cause).
#[derive(Debug, Error, Serialize)]
#[error("{message}")]
pub struct StructuredError {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<Detail>,
    #[serde(skip)]
    description: Option<String>,
    #[serde(skip)]
    #[source]
    cause: Option<BoxError>,
}

impl StructuredError {
    // == Constructors ==
    /// Creates an error with the given code and message and no cause.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: non_empty_code(code.into()),
            message: message.into(),
            details: Vec::new(),
            description: None,
            cause: None,
        }
    }

    /// Creates an error with the given code and message caused by `cause`.
    pub fn wrap(
        cause: impl Into<BoxError>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let cause = cause.into();
        Self {
            code: non_empty_code(code.into()),
            message: message.into(),
            details: Vec::new(),
            description: Some(cause.to_string()),
            cause: Some(cause),
        }
    }

    /// Creates an `internal` error with the given message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, message)
    }

    /// Wraps `cause` into an `internal` error with the given message.
    pub fn wrap_msg(cause: impl Into<BoxError>, message: impl Into<String>) -> Self {
        Self::wrap(cause, codes::INTERNAL, message)
    }

    /// Starts a builder that stamps `code` on the errors it creates.
    pub fn with_code(code: impl Into<String>) -> ErrorBuilder {
        ErrorBuilder::default().with_code(code)
    }

    /// Starts a builder that attaches `details` to the errors it creates.
    pub fn with_details(details: impl IntoIterator<Item = Detail>) -> ErrorBuilder {
        ErrorBuilder::default().with_details(details)
    }

    // == Fixed Kinds ==
    pub fn not_found(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::RESOURCE_NOT_FOUND, "Resource not found")
    }

    pub fn unauthorized(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::UNAUTHORIZED, "Not authorized")
    }

    pub fn bad_request(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::BAD_REQUEST, "Bad Request")
    }

    /// Internal fault. Be careful when overriding the message: it is
    /// visible to clients.
    pub fn internal(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::INTERNAL, "Something went wrong")
    }

    pub fn validation(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::VALIDATION_FAILED, "Request validation failed")
    }

    /// The requested key is absent from the cache.
    pub fn cache_miss(cause: impl Into<BoxError>) -> Self {
        Self::wrap(cause, codes::CACHE_MISS, "Key not found in cache")
    }

    /// Replaces the client message with `parts` joined by ", ".
    ///
    /// An empty iterator keeps the default message.
    pub fn with_messages<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = parts.into_iter().map(|p| p.as_ref().to_string()).collect();
        if !parts.is_empty() {
            self.message = parts.join(", ").trim().to_string();
        }
        self
    }

    /// Replaces the client message.
    pub fn with_message(self, message: impl AsRef<str>) -> Self {
        self.with_messages([message])
    }

    // == Accessors ==
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[Detail] {
        &self.details
    }

    /// Internal description, never sent to clients.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Walks the cause chain and returns its last link.
    ///
    /// Returns `self` when the error has no cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Returns the first cause in the chain of type `E`.
    pub fn downcast_cause<E: StdError + 'static>(&self) -> Option<&E> {
        std::iter::successors(self.source(), |&err| err.source())
            .find_map(|err| err.downcast_ref::<E>())
    }

    // == Classification ==
    pub fn is_cache_miss(&self) -> bool {
        self.code == codes::CACHE_MISS
    }

    pub fn is_not_found(&self) -> bool {
        self.code == codes::RESOURCE_NOT_FOUND || self.code == codes::NOT_FOUND
    }

    pub fn status(&self) -> axum::http::StatusCode {
        codes::http_status(&self.code)
    }
}

fn non_empty_code(code: String) -> String {
    if code.is_empty() {
        codes::INTERNAL.to_string()
    } else {
        code
    }
}

// == Error Builder ==
/// Immutable configuration for creating errors with a fixed code and
/// accumulated details.
///
/// Every method takes `&self` and returns a fresh value, so a shared builder
/// can be extended in several directions without affecting the others.
#[derive(Debug, Clone, Default)]
pub struct ErrorBuilder {
    code: Option<String>,
    details: Vec<Detail>,
}

impl ErrorBuilder {
    pub fn with_code(&self, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            details: self.details.clone(),
        }
    }

    /// Appends `details` to those already configured.
    pub fn with_details(&self, details: impl IntoIterator<Item = Detail>) -> Self {
        let mut merged = self.details.clone();
        merged.extend(details);
        Self {
            code: self.code.clone(),
            details: merged,
        }
    }

    pub fn build(&self, message: impl Into<String>) -> StructuredError {
        let mut err = StructuredError::new(self.code(), message);
        err.details = self.details.clone();
        err
    }

    pub fn wrap(&self, cause: impl Into<BoxError>, message: impl Into<String>) -> StructuredError {
        let mut err = StructuredError::wrap(cause, self.code(), message);
        err.details = self.details.clone();
        err
    }

    fn code(&self) -> String {
        self.code
            .clone()
            .unwrap_or_else(|| codes::INTERNAL.to_string())
    }
}

// == Classification Helpers ==
/// Returns true when `err` is a `cache_miss` error.
pub fn is_cache_miss(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<StructuredError>()
        .is_some_and(StructuredError::is_cache_miss)
}

/// Returns true when `err` is a not-found error.
pub fn is_not_found(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<StructuredError>()
        .is_some_and(StructuredError::is_not_found)
}

/// Maps any error to its HTTP status. Errors outside the taxonomy are 500.
pub fn http_status(err: &(dyn StdError + 'static)) -> axum::http::StatusCode {
    if let Some(err) = err.downcast_ref::<StructuredError>() {
        return err.status();
    }
    if let Some(err) = err.downcast_ref::<ValidationError>() {
        return err.status();
    }
    axum::http::StatusCode::INTERNAL_SERVER_ERROR
}

// == IntoResponse Implementation ==
impl IntoResponse for StructuredError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                code = %self.code,
                description = self.description.as_deref().unwrap_or_default(),
                root_cause = %self.root_cause(),
                "Request failed"
            );
        }
        (status, Json(self)).into_response()
    }
}
