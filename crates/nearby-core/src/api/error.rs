use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// The failure of a call to the remote friend service.
///
/// Every problem a remote call can run into (server-side script errors,
/// HTTP errors, transport errors, undecodable bodies) collapses into a
/// numeric code and a human-readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Remote call failed ({code}): {message}")]
pub struct RemoteCallFailure {
    pub code: i64,
    pub message: String,
}

/// Error body returned by the cloud function endpoint
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    error: String,
}

impl RemoteCallFailure {
    /// The connection to the server failed or timed out.
    pub const CONNECTION_FAILED: i64 = 100;

    /// The server response could not be decoded.
    pub const INVALID_JSON: i64 = 107;

    /// A cloud function reported an error.
    pub const SCRIPT_FAILED: i64 = 141;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
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

    /// Build a failure from a non-success response.
    ///
    /// Structured error bodies keep their own code and message; anything else
    /// is reported under the HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return Self::new(parsed.code, parsed.error);
        }

        let truncated = Self::truncate_body(body);
        let message = if truncated.is_empty() {
            status.to_string()
        } else {
            format!("Status {}: {}", status, truncated)
        };
        Self::new(i64::from(status.as_u16()), message)
    }

    /// The rate limit was still in effect after all retries.
    pub fn rate_limited() -> Self {
        Self::new(
            i64::from(reqwest::StatusCode::TOO_MANY_REQUESTS.as_u16()),
            "Rate limited - please wait before retrying",
        )
    }
}

impl From<reqwest::Error> for RemoteCallFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::new(Self::INVALID_JSON, format!("Invalid response: {}", err))
        } else {
            Self::new(Self::CONNECTION_FAILED, format!("Network error: {}", err))
        }
    }
}
