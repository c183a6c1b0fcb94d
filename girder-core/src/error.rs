// Error types for the Girder framework

use crate::HttpStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors, raised while the application is being assembled
    #[error("Invalid factory for {name}: {reason}")]
    InvalidFactory { name: String, reason: String },

    #[error("Missing dependency: {dependency} required by {required_by}")]
    MissingDependency {
        dependency: String,
        required_by: String,
    },

    #[error("Cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Invalid permission key: {0}")]
    InvalidPermissionKey(String),

    #[error("Duplicate route: {0}")]
    DuplicateRoute(String),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Dependency injection error: {0}")]
    DependencyInjection(String),

    // Resolution errors
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Type mismatch for {name}: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    // Request errors
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) | Error::NotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed.code(),
            Error::PayloadTooLarge(_) => HttpStatus::PayloadTooLarge.code(),
            Error::Validation(_) => HttpStatus::UnprocessableEntity.code(),
            Error::Unauthorized(_) => HttpStatus::Unauthorized.code(),
            Error::Forbidden(_) => HttpStatus::Forbidden.code(),

            // A missing provider at request time is a bad request at the boundary
            Error::ProviderNotFound(_)
            | Error::TypeMismatch { .. }
            | Error::BadRequest(_)
            | Error::Deserialization(_) => HttpStatus::BadRequest.code(),

            // Default to 500 for unmapped errors
            _ => HttpStatus::InternalServerError.code(),
        }
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        HttpStatus::from_code(self.status_code()).unwrap_or(HttpStatus::InternalServerError)
    }

    /// HTTP status used when this error aborts a decorator chain.
    ///
    /// Only the three sentinel kinds change the status family; every other
    /// abort is rendered as a bad request.
    pub fn abort_status(&self) -> u16 {
        match self {
            Error::Forbidden(_) => HttpStatus::Forbidden.code(),
            Error::Unauthorized(_) => HttpStatus::Unauthorized.code(),
            Error::Internal(_) => HttpStatus::InternalServerError.code(),
            _ => HttpStatus::BadRequest.code(),
        }
    }

    /// True for errors that describe a broken application assembly
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFactory { .. }
                | Error::MissingDependency { .. }
                | Error::CyclicDependency(_)
                | Error::InvalidPermissionKey(_)
                | Error::DuplicateRoute(_)
                | Error::InvalidResource(_)
                | Error::DependencyInjection(_)
        )
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_status_sentinels() {
        assert_eq!(Error::Forbidden("x".into()).abort_status(), 403);
        assert_eq!(Error::Unauthorized("x".into()).abort_status(), 401);
        assert_eq!(Error::Internal("x".into()).abort_status(), 500);
        assert_eq!(Error::NotFound("x".into()).abort_status(), 400);
        assert_eq!(Error::Validation("x".into()).abort_status(), 400);
    }

    #[test]
    fn test_provider_not_found_is_bad_request() {
        let err = Error::ProviderNotFound("app::Missing".into());
        assert_eq!(err.status_code(), 400);
        assert!(err.is_client_error());
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::CyclicDependency(vec!["a::A".into(), "b::B".into(), "a::A".into()]);
        assert_eq!(err.to_string(), "Cyclic dependency: a::A -> b::B -> a::A");
        assert!(err.is_configuration_error());
    }
}
