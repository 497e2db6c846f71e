//! Response envelope decoding.
//!
//! Every FastGram endpoint wraps its payload as `{success, message, data}`.
//! Error responses may carry `message`, `error`, or a list of validation
//! `errors`; the first validation message wins over the generic fields.

use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::error::Category;
use serde_json::Value;
use tracing::debug;

use super::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Envelope for endpoints whose `data` is empty or irrelevant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Read the response body and decode it, translating non-2xx into `ApiError`.
pub async fn handle_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    decode_body(status, &body)
}

/// Decode a response body that has already been read.
pub fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(error_from_body(status, body));
    }

    serde_json::from_str(body).map_err(|e| {
        // The serde message can quote body content (tokens on auth endpoints),
        // so only its category and position are kept
        let kind = match e.classify() {
            Category::Io => "I/O",
            Category::Syntax => "syntax",
            Category::Data => "unexpected shape",
            Category::Eof => "truncated body",
        };
        debug!(status = %status, kind, line = e.line(), column = e.column(), "Failed to decode response body");
        ApiError::InvalidResponse(format!(
            "{} at line {} column {} ({} bytes)",
            kind,
            e.line(),
            e.column(),
            body.len()
        ))
    })
}

/// Translate an error response into the error taxonomy.
///
/// Each field is read on its own, so one oddly typed field does not hide the
/// others.
pub fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    if let Some(message) = first_validation_message(&parsed) {
        return ApiError::Validation { message };
    }

    let message = text_field(&parsed, "message")
        .or_else(|| text_field(&parsed, "error"))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    ApiError::Request { status, message }
}

/// `errors[0]` as a plain string or as `{ message }`
fn first_validation_message(body: &Value) -> Option<String> {
    let first = body.get("errors")?.as_array()?.first()?;
    let message = match first {
        Value::String(s) => s.as_str(),
        Value::Object(_) => first.get("message")?.as_str()?,
        _ => return None,
    };
    (!message.is_empty()).then(|| message.to_string())
}

fn text_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: i64,
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = r#"{"success":true,"message":"ok","data":{"value":7}}"#;
        let env: Envelope<Payload> = decode_body(StatusCode::OK, body).unwrap();
        assert!(env.success);
        assert_eq!(env.message, "ok");
        assert_eq!(env.data, Payload { value: 7 });
    }

    #[test]
    fn test_decode_empty_data_as_message() {
        let body = r#"{"success":true,"message":"Logged out","data":{}}"#;
        let msg: ApiMessage = decode_body(StatusCode::OK, body).unwrap();
        assert_eq!(msg.message, "Logged out");
    }

    #[test]
    fn test_validation_message_takes_priority() {
        let body = r#"{"message":"Validation failed","errors":[{"field":"email","message":"Email is invalid"},{"message":"second"}]}"#;
        let err = error_from_body(StatusCode::BAD_REQUEST, body);
        match err {
            ApiError::Validation { message } => assert_eq!(message, "Email is invalid"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_message_then_error_field() {
        let err = error_from_body(StatusCode::CONFLICT, r#"{"message":"Email taken"}"#);
        assert_eq!(err.to_string(), "Email taken");
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));

        let err = error_from_body(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid token"}"#);
        assert_eq!(err.to_string(), "Invalid token");
    }

    #[test]
    fn test_empty_errors_list_falls_back_to_message() {
        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"message":"Bad","errors":[]}"#);
        assert!(matches!(err, ApiError::Request { .. }));
        assert_eq!(err.to_string(), "Bad");
    }

    #[test]
    fn test_unparseable_error_body_uses_status() {
        let err = error_from_body(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_non_json_success_is_invalid_response() {
        let res: Result<Envelope<Payload>, _> = decode_body(StatusCode::OK, "not json");
        assert!(matches!(res, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_null_errors_keeps_message() {
        let body = r#"{"message":"Email already taken","errors":null}"#;
        let err = error_from_body(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, ApiError::Request { .. }));
        assert_eq!(err.to_string(), "Email already taken");
    }

    #[test]
    fn test_object_error_field_keeps_message() {
        let body = r#"{"message":"Bad input","error":{"code":"E1"}}"#;
        let err = error_from_body(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "Bad input");

        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"message":7,"error":"Bad token"}"#);
        assert_eq!(err.to_string(), "Bad token");
    }

    #[test]
    fn test_non_message_validation_entries_are_skipped() {
        let body = r#"{"message":"Validation failed","errors":[{"field":"email"}]}"#;
        let err = error_from_body(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, ApiError::Request { .. }));
        assert_eq!(err.to_string(), "Validation failed");
    }

    #[test]
    fn test_decode_failure_does_not_echo_body() {
        let body = r#"{"data":{"value":"access-token-xyz"}}"#;
        let err = decode_body::<Envelope<Payload>>(StatusCode::OK, body).unwrap_err();
        let text = err.to_string();
        assert!(!text.contains("access-token-xyz"));
        assert!(text.contains("unexpected shape"));
    }
}
