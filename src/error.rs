use reqwest::StatusCode;
use serde_json::Value;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the client can report.
///
/// HTTP failures carry the status code and the server message (when the body
/// had one). Rate-limit failures also carry the number of seconds until the
/// quota window resets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request argument was rejected before anything was sent.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// No API key was supplied and none could be found in the environment.
    #[error(
        "API key not set: an API key is required when using the OpenAQ API (pass one explicitly, set OPENAQ_API_KEY or add `api-key` to ~/.openaq.toml)"
    )]
    ApiKeyMissing,

    #[error("HTTP {status} bad request: {message}")]
    BadRequest { status: u16, message: String },

    #[error("HTTP 401 not authorized: {message}")]
    NotAuthorized { message: String },

    #[error("HTTP 403 forbidden: {message}")]
    Forbidden { message: String },

    #[error("HTTP 404 not found: {message}")]
    NotFound { message: String },

    #[error("HTTP 408 request timeout: {message}")]
    Timeout { message: String },

    /// No response arrived within the configured timeout.
    #[error("request timed out: {0}")]
    TransportTimeout(String),

    /// The server answered 429.
    #[error("HTTP 429 rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        reset_seconds: Option<u64>,
    },

    /// The local quota is exhausted and the client is configured to fail fast.
    #[error("rate limit exceeded, limit resets in {reset_seconds} seconds")]
    HttpRateLimit { reset_seconds: u64 },

    /// HTTP 500 and unmapped 5xx, or a payload that did not match the expected shape.
    #[error("HTTP {status} server error: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP 502 bad gateway: {message}")]
    BadGateway { message: String },

    #[error("HTTP 503 service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("HTTP 504 gateway timeout: {message}")]
    GatewayTimeout { message: String },

    /// The connection could not be made or broke mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The client was closed before the call.
    #[error("client is closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[source] serde_json::Error),
}

impl Error {
    /// HTTP status associated with the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::NotAuthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Timeout { .. } => Some(408),
            Self::RateLimit { .. } => Some(429),
            Self::BadGateway { .. } => Some(502),
            Self::ServiceUnavailable { .. } => Some(503),
            Self::GatewayTimeout { .. } => Some(504),
            _ => None,
        }
    }

    /// Seconds until the rate-limit window resets, for both rate-limit kinds.
    pub fn reset_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimit { reset_seconds, .. } => *reset_seconds,
            Self::HttpRateLimit { reset_seconds } => Some(*reset_seconds),
            _ => None,
        }
    }

    /// Whether the failure happened before the request left the process.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ApiKeyMissing | Self::HttpRateLimit { .. } | Self::Closed
        )
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TransportTimeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    // FastAPI style: a string, or a list of {loc, msg, type} objects.
    #[serde(default)]
    pub(crate) detail: Option<Value>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl ApiErrorResponse {
    fn summary(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return Some(message.to_string());
        }
        match self.detail.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let msgs: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(Value::as_str) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                Some(msgs.join("; "))
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Picks the most useful human-readable message out of an error body.
pub(crate) fn server_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.summary())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Maps a non-2xx status to its error kind.
pub(crate) fn error_for_status(status: StatusCode, body: &str, reset_seconds: Option<u64>) -> Error {
    let message = server_message(body);
    match status.as_u16() {
        400 | 422 => Error::BadRequest {
            status: status.as_u16(),
            message,
        },
        401 => Error::NotAuthorized { message },
        403 => Error::Forbidden { message },
        404 => Error::NotFound { message },
        408 => Error::Timeout { message },
        429 => Error::RateLimit {
            message,
            reset_seconds,
        },
        502 => Error::BadGateway { message },
        503 => Error::ServiceUnavailable { message },
        504 => Error::GatewayTimeout {
            message: "your request timed out on the server, consider reducing the complexity of your request"
                .to_string(),
        },
        code if (400..500).contains(&code) => Error::BadRequest {
            status: code,
            message,
        },
        code => Error::Server {
            status: code,
            message,
        },
    }
}
