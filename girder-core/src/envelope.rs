// Standard JSON response envelope

use crate::decorator::Abort;
use crate::{Error, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"code", "message", "data", "request_id"}`
///
/// Success envelopes carry `code: 0`. Error envelopes carry the abort status
/// or the error's HTTP status as `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub data: Value,
    pub request_id: String,
}

impl Envelope {
    pub fn success(data: Value, request_id: &str) -> Self {
        Self {
            code: 0,
            message: "ok".to_string(),
            data,
            request_id: request_id.to_string(),
        }
    }

    pub fn from_error(error: &Error, request_id: &str) -> Self {
        Self {
            code: error.status_code(),
            message: error.to_string(),
            data: Value::Null,
            request_id: request_id.to_string(),
        }
    }

    pub fn from_abort(abort: &Abort, request_id: &str) -> Self {
        let code = match (abort.status, &abort.error) {
            (0, Some(error)) => error.status_code(),
            (0, None) => 400,
            (status, _) => status,
        };
        Self {
            code,
            message: abort.message(),
            data: abort.payload.clone(),
            request_id: request_id.to_string(),
        }
    }

    pub fn into_response(self, status: u16) -> Result<HttpResponse, Error> {
        HttpResponse::new(status).with_json(&self)
    }

    /// Like [`into_response`](Self::into_response), falling back to a bare 500
    pub fn render(self, status: u16) -> HttpResponse {
        self.into_response(status).unwrap_or_else(|e| {
            HttpResponse::internal_server_error().with_body(e.to_string().into_bytes())
        })
    }
}

/// Response for an aborted decorator chain
pub fn abort_response(abort: &Abort, request_id: &str) -> HttpResponse {
    Envelope::from_abort(abort, request_id).render(abort.http_status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forbidden_abort_renders_403() {
        let abort = Abort::from(Error::Forbidden("requires Role.Create".into()));
        let response = abort_response(&abort, "req-1");
        assert_eq!(response.status, 403);

        let envelope: Envelope = response.json().unwrap();
        assert_eq!(envelope.code, 403);
        assert_eq!(envelope.request_id, "req-1");
        assert!(envelope.message.contains("Role.Create"));
    }

    #[test]
    fn test_custom_status_without_error_is_bad_request() {
        let abort = Abort::new(4201).with_payload(json!({"field": "name"}));
        let response = abort_response(&abort, "req-2");
        assert_eq!(response.status, 400);

        let envelope: Envelope = response.json().unwrap();
        assert_eq!(envelope.code, 4201);
        assert_eq!(envelope.data["field"], "name");
    }

    #[test]
    fn test_error_without_status_uses_error_code() {
        let abort = Abort::new(0).with_error(Error::Unauthorized("no session".into()));
        let envelope = Envelope::from_abort(&abort, "req-3");
        assert_eq!(envelope.code, 401);
        assert_eq!(abort.http_status(), 401);
    }
}
