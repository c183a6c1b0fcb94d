// Core traits for the Girder framework

use crate::{Caller, Error, HttpRequest, Route};
use async_trait::async_trait;
use std::any::Any;

/// Establishes who is calling.
///
/// This is the seam to the session or token manager; the dispatcher asks it
/// once per request before any decorator runs.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns `Ok(None)` for anonymous requests.
    async fn identify(&self, request: &HttpRequest) -> Result<Option<Caller>, Error>;
}

/// Identity provider that never authenticates anyone
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl IdentityProvider for Anonymous {
    async fn identify(&self, _request: &HttpRequest) -> Result<Option<Caller>, Error> {
        Ok(None)
    }
}

/// Opaque handle to the storage client shared by every request.
///
/// Girder never queries storage itself; it only hands the backend, together
/// with the filters accumulated by decorators, to handlers.
pub trait StorageBackend: Any + Send + Sync + 'static {
    fn name(&self) -> &str;
}

/// Placeholder backend for applications without storage
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl StorageBackend for NullStorage {
    fn name(&self) -> &str {
        "null"
    }
}

/// Accepts method/path/handler triples from the REST registrar
pub trait Transport {
    fn add_route(&mut self, route: Route) -> Result<(), Error>;
}

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
    /// Matches every method
    ANY,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "ANY" => Some(HttpMethod::ANY),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::ANY => "ANY",
        }
    }

    /// Whether a request with the given method is served by this route method
    pub fn accepts(&self, method: &str) -> bool {
        *self == HttpMethod::ANY || self.as_str().eq_ignore_ascii_case(method)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
