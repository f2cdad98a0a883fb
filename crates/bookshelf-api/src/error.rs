use bookshelf_core::protocol::ValidationError;
use serde_json::Value;
use thiserror::Error;

/// Every way a backend call can fail. The `Display` text is what a reader
/// of the site gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Rejected before any request was made.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// 401: missing, invalid or expired credentials.
    #[error("{message}")]
    Unauthorized { message: String },

    /// 429: the backend's rate limiter kicked in.
    #[error("{message}")]
    RateLimited { message: String },

    /// Any other non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout,
    /// dropped connection).
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-2xx response. `fallback` is used when the body carries
    /// no usable message, e.g. "Login failed".
    pub fn from_status(status: u16, body: &str, fallback: &str) -> Self {
        let server_message = extract_message(body);
        match status {
            401 => ApiError::Unauthorized {
                message: server_message.unwrap_or_else(|| "Authentication required".into()),
            },
            429 => ApiError::RateLimited {
                message: server_message
                    .unwrap_or_else(|| "Too many requests, please try again shortly".into()),
            },
            _ => ApiError::Status {
                status,
                message: server_message.unwrap_or_else(|| fallback.to_string()),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("request timed out".into())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Pull a human-readable message out of an error body. FastAPI puts it in
/// `detail`; some handlers use `message`.
fn extract_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| v.get(*key)?.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_field_becomes_the_message() {
        let err = ApiError::from_status(409, r#"{"detail":"Email already registered"}"#, "Signup failed");
        assert_eq!(
            err,
            ApiError::Status {
                status: 409,
                message: "Email already registered".into()
            }
        );
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn message_field_is_also_accepted() {
        let err = ApiError::from_status(400, r#"{"message":"bad"}"#, "Signup failed");
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn fallback_when_body_has_no_message() {
        assert_eq!(
            ApiError::from_status(500, "<html>oops</html>", "Login failed").to_string(),
            "Login failed"
        );
        // Pydantic validation errors put a list in `detail`.
        assert_eq!(
            ApiError::from_status(422, r#"{"detail":[{"msg":"x"}]}"#, "Signup failed").to_string(),
            "Signup failed"
        );
    }

    #[test]
    fn unauthorized_and_rate_limited_are_distinct() {
        let err = ApiError::from_status(401, r#"{"detail":"Invalid email or password"}"#, "Login failed");
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(err.status(), Some(401));

        let err = ApiError::from_status(429, "", "Login failed");
        assert!(matches!(err, ApiError::RateLimited { .. }));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn network_errors_have_no_status() {
        let err = ApiError::Network("connection refused".into());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Network error: connection refused");
    }
}
