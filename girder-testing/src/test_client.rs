// Test HTTP Client

use girder_core::{Application, Envelope, Error, HttpMethod, HttpRequest, HttpResponse, Router};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
enum Target {
    Application(Arc<Application>),
    Router(Arc<Router>),
}

/// Drives an application or a bare router in-process; no sockets
#[derive(Clone)]
pub struct TestClient {
    target: Target,
    headers: HashMap<String, String>,
}

impl TestClient {
    /// Client over a bare router; routing errors come back as [`TestResponse::Error`]
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            target: Target::Router(router),
            headers: HashMap::new(),
        }
    }

    /// Client over a full application; routing errors are enveloped
    pub fn for_app(app: Arc<Application>) -> Self {
        Self {
            target: Target::Application(app),
            headers: HashMap::new(),
        }
    }

    /// Header sent with every request unless the request sets it itself
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::DELETE, path, None).await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, data: &T) -> TestResponse {
        self.json(HttpMethod::POST, path, data).await
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, data: &T) -> TestResponse {
        self.json(HttpMethod::PUT, path, data).await
    }

    async fn json<T: Serialize>(&self, method: HttpMethod, path: &str, data: &T) -> TestResponse {
        match HttpRequest::new(method.as_str(), path).with_json(data) {
            Ok(request) => self.send(request).await,
            Err(error) => TestResponse::Error(error),
        }
    }

    pub async fn request(&self, method: HttpMethod, path: &str, body: Option<Vec<u8>>) -> TestResponse {
        let request = HttpRequest::new(method.as_str(), path).with_body(body.unwrap_or_default());
        self.send(request).await
    }

    /// Send a prepared request with the client's default headers merged in
    pub async fn send(&self, mut request: HttpRequest) -> TestResponse {
        for (key, value) in &self.headers {
            request
                .headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        match &self.target {
            Target::Application(app) => TestResponse::Success(app.handle(request).await),
            Target::Router(router) => match router.route(request).await {
                Ok(response) => TestResponse::Success(response),
                Err(error) => TestResponse::Error(error),
            },
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub enum TestResponse {
    Success(HttpResponse),
    Error(Error),
}

impl TestResponse {
    /// Assert the request produced a response and return it
    pub fn assert_success(&self) -> &HttpResponse {
        match self {
            TestResponse::Success(response) => response,
            TestResponse::Error(error) => {
                panic!("Expected a response, got error: {error:?}")
            }
        }
    }

    /// Assert the request failed before producing a response
    pub fn assert_error(&self) -> &Error {
        match self {
            TestResponse::Error(error) => error,
            TestResponse::Success(response) => {
                panic!("Expected error, got response with status {}", response.status)
            }
        }
    }

    /// Response status, or the status the error maps to
    pub fn status(&self) -> u16 {
        match self {
            TestResponse::Success(response) => response.status,
            TestResponse::Error(error) => error.status_code(),
        }
    }

    pub fn body_string(&self) -> Option<String> {
        match self {
            TestResponse::Success(response) => String::from_utf8(response.body.clone()).ok(),
            TestResponse::Error(_) => None,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match self {
            TestResponse::Success(response) => response.json(),
            TestResponse::Error(error) => Err(Error::Internal(format!("no response body: {error}"))),
        }
    }

    /// The body parsed as a standard envelope
    pub fn envelope(&self) -> Envelope {
        match self.json::<Envelope>() {
            Ok(envelope) => envelope,
            Err(error) => panic!("Response is not an envelope: {error}; body: {:?}", self.body_string()),
        }
    }

    pub fn header(&self, key: &str) -> Option<&String> {
        match self {
            TestResponse::Success(response) => response.header(key),
            TestResponse::Error(_) => None,
        }
    }

    pub fn assert_status(&self, expected: u16) -> &Self {
        let actual = self.status();
        assert_eq!(
            actual,
            expected,
            "Expected status {expected}, got {actual}; body: {:?}",
            self.body_string()
        );
        self
    }

    /// Compare one field of the JSON body.
    ///
    /// `field` is either a JSON pointer (`/data/name`) or a dotted path
    /// (`data.name`); array indices are plain numbers in both forms.
    pub fn assert_json_field(&self, field: &str, expected: impl Into<Value>) -> &Self {
        let body: Value = match self.json() {
            Ok(body) => body,
            Err(error) => panic!("Response body is not JSON: {error}"),
        };
        let pointer = if field.starts_with('/') {
            field.to_string()
        } else {
            format!("/{}", field.replace('.', "/"))
        };
        let expected = expected.into();
        assert_eq!(
            body.pointer(&pointer),
            Some(&expected),
            "Field {field} mismatch in {body}"
        );
        self
    }
}
