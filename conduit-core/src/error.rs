// Error types for the Conduit framework

use crate::HttpResponse;
use crate::status::{StatusClass, reason_phrase};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Usage errors
    #[error("No middleware to run")]
    NoMiddleware,

    // Middleware shape and resolution errors
    #[error("Invalid middleware: {0}")]
    InvalidMiddleware(String),

    #[error("Middleware could not be resolved: {0}")]
    MiddlewareNotFound(String),

    #[error("Middleware {middleware} failed: {message}")]
    MiddlewareFailed { middleware: String, message: String },

    // Errors raised by response validation
    #[error("HTTP error {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not Implemented: {0}")]
    NotImplemented(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    // Container errors
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider {0} is frozen and cannot be replaced")]
    ContainerFrozen(String),

    #[error("Provider {key} is not a {expected}")]
    ProviderType { key: String, expected: &'static str },

    // Routing
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Generic HTTP error for `status`, using the standard reason phrase
    pub fn http(status: u16) -> Self {
        Error::Http {
            status,
            reason: reason_phrase(status).unwrap_or_default().to_string(),
        }
    }

    /// Failure raised by a middleware unit itself
    pub fn middleware(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MiddlewareFailed {
            middleware: middleware.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Http { status, .. } => *status,
            Error::BadRequest(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::RouteNotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::NotImplemented(_) => 501,
            Error::ServiceUnavailable(_) => 503,

            // Default to 500 for unmapped errors
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        StatusClass::of(self.status_code()) == StatusClass::ClientError
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        StatusClass::of(self.status_code()) == StatusClass::ServerError
    }

    /// Render as a JSON error response
    ///
    /// Codes outside the valid range are rendered as 500 so the result is
    /// always a sendable response.
    pub fn into_response(self) -> HttpResponse {
        let status = match StatusClass::of(self.status_code()) {
            StatusClass::Invalid => 500,
            _ => self.status_code(),
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status,
        });
        HttpResponse::json(&body)
            .map(|response| response.with_status(status))
            .unwrap_or_else(|_| HttpResponse::internal_server_error())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
