use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Transport-level failures. The `Option<String>` on status variants carries
/// the message from the server's `{"error": {"message": ...}}` body when it
/// sent one.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized(Option<String>),

    #[error("Access denied")]
    AccessDenied(Option<String>),

    #[error("Resource not found")]
    NotFound(Option<String>),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: HTTP {0}")]
    ServerError(StatusCode, Option<String>),

    #[error("Unexpected response: HTTP {0}")]
    UnexpectedStatus(StatusCode, Option<String>),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in log messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull `error.message` out of a structured error body
    pub fn extract_server_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::extract_server_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(status, message),
            _ => ApiError::UnexpectedStatus(status, message),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::ServerError(status, _) | ApiError::UnexpectedStatus(status, _) => {
                Some(*status)
            }
            ApiError::NetworkError(e) => e.status(),
            ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(message)
            | ApiError::AccessDenied(message)
            | ApiError::NotFound(message)
            | ApiError::ServerError(_, message)
            | ApiError::UnexpectedStatus(_, message) => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Human-readable reason for the UI: the server's own message when it
    /// sent one, else the HTTP status, else the transport error.
    pub fn reason(&self) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        match (self, self.status()) {
            (ApiError::NetworkError(_), _) | (ApiError::InvalidResponse(_), _) => self.to_string(),
            (_, Some(status)) => format!("HTTP {}", status),
            (_, None) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_server_message() {
        let body = r#"{"error":{"message":"Invalid Username/Email or Password","status_code":401}}"#;
        assert_eq!(
            ApiError::extract_server_message(body).as_deref(),
            Some("Invalid Username/Email or Password")
        );
        assert_eq!(ApiError::extract_server_message("not json"), None);
        assert_eq!(ApiError::extract_server_message(r#"{"error":{}}"#), None);
        assert_eq!(ApiError::extract_server_message(r#"{"error":{"message":"  "}}"#), None);
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(None)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(StatusCode::BAD_GATEWAY, None)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, ""),
            ApiError::UnexpectedStatus(StatusCode::BAD_REQUEST, None)
        ));
    }

    #[test]
    fn test_reason_prefers_server_message() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Invalid Username/Email or Password"}}"#,
        );
        assert_eq!(err.reason(), "Invalid Username/Email or Password");
    }

    #[test]
    fn test_reason_falls_back_to_status() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "<html>oops</html>");
        assert_eq!(err.reason(), "HTTP 400 Bad Request");
        assert_eq!(ApiError::RateLimited.reason(), "HTTP 429 Too Many Requests");
        assert_eq!(
            ApiError::InvalidResponse("missing token".to_string()).reason(),
            "Invalid response: missing token"
        );
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 510 total bytes"));
    }
}
