// Test assertions for HTTP responses

use crate::TestResponse;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    response.assert_status(expected);
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key).map(|s| s.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{key}' to be '{expected}', got {actual:?}"
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{expected}', but it didn't. Body: {body}"
    );
}

/// Assert an error envelope with `code`, echoing the response's request id
pub fn assert_envelope_error(response: &TestResponse, code: u16) {
    let envelope = response.envelope();
    assert_eq!(envelope.code, code, "Unexpected envelope: {envelope:?}");
    if let Some(id) = response.header("x-request-id") {
        assert_eq!(&envelope.request_id, id, "Envelope and header request ids differ");
    }
}
