//! Error types for the lexa chat client.
//!
//! Every failure the client can observe is represented here: validation and
//! entitlement rejections raised before anything is sent, transport and model
//! failures raised while talking to the model API, and persistence failures
//! raised by the local store.  None of them are fatal; callers surface them as
//! notices and return to an idle prompt.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The underlying cause of an error, shared so that errors stay `Clone`.
pub type Source = Arc<dyn error::Error + Send + Sync>;

/// The main error type for the lexa client.
#[derive(Clone, Debug)]
pub enum Error {
    /// The model API answered with a status this client has no variant for.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error status string from the API, e.g. `FAILED_PRECONDITION`.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// The API key is missing or was refused.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The user is not entitled to perform the action.
    Permission {
        /// Human-readable error message.
        message: String,
    },

    /// The model API is throttling this key.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Seconds to wait before trying again.
        retry_after: Option<u64>,
    },

    /// The model API rejected the request or blocked the reply.
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// The request took longer than the configured timeout.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// The timeout that elapsed, in seconds.
        duration: Option<f64>,
    },

    /// A turn is already in flight.
    Busy {
        /// Human-readable error message.
        message: String,
    },

    /// The request never reached the model API or its answer was lost.
    Transport {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The model API failed on its side (HTTP 5xx).
    Server {
        /// HTTP status code.
        status_code: u16,
        /// Human-readable error message.
        message: String,
        /// Seconds to wait before trying again.
        retry_after: Option<u64>,
    },

    /// A value could not be encoded or decoded as JSON.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The local store could not be read or written.
    Io {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Arc<io::Error>,
    },

    /// A user-supplied value was rejected.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// The reply stream broke off.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The reply stream was not valid UTF-8.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        Error::Busy {
            message: message.into(),
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new server error.
    pub fn server(status_code: u16, message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::Server {
            status_code,
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if the API key is missing or was refused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is an entitlement rejection.
    pub fn is_permission(&self) -> bool {
        matches!(self, Error::Permission { .. })
    }

    /// Returns true if the model API is throttling.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if a turn was already in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy { .. })
    }

    /// Returns true if the model API failed on its side.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server { .. })
    }

    /// Returns true if a user-supplied value was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error came from the local store.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Serialization { .. })
    }

    /// The HTTP status the model API answered with, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } | Error::Server { status_code, .. } => {
                Some(*status_code)
            }
            Error::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

/// ` (retry after N seconds)` when the API said how long to wait.
struct RetryHint(Option<u64>);

impl fmt::Display for RetryHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(seconds) => write!(f, " (retry after {seconds} seconds)"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                error_type: Some(error_type),
                message,
                ..
            } => write!(f, "{error_type}: {message}"),
            Error::Api { message, .. } => write!(f, "API error: {message}"),
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Not allowed: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => write!(f, "Rate limit exceeded: {message}{}", RetryHint(*retry_after)),
            Error::BadRequest { message } => write!(f, "Bad request: {message}"),
            Error::Timeout {
                message,
                duration: Some(duration),
            } => write!(f, "Timed out after {duration} seconds: {message}"),
            Error::Timeout { message, .. } => write!(f, "Timed out: {message}"),
            Error::Busy { message } => write!(f, "Busy: {message}"),
            Error::Transport { message, .. } => write!(f, "Transport error: {message}"),
            Error::Server {
                status_code,
                message,
                retry_after,
            } => write!(
                f,
                "Server error {status_code}: {message}{}",
                RetryHint(*retry_after)
            ),
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::Validation {
                message,
                param: Some(param),
            } => write!(f, "{message} (parameter: {param})"),
            Error::Validation { message, .. } => write!(f, "{message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Transport { source, .. }
            | Error::Serialization { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_deref()
                .map(|source| source as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::validation(format!("invalid URL: {err}"), Some("url".to_string()))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for lexa operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_is_the_notice() {
        let err = Error::validation("You can only upload a maximum of 5 files.", None);
        assert_eq!(err.to_string(), "You can only upload a maximum of 5 files.");
        assert!(err.is_validation());
        assert!(!err.is_persistence());
        let err = Error::validation("bad key", Some("key".to_string()));
        assert_eq!(err.to_string(), "bad key (parameter: key)");
    }

    #[test]
    fn persistence_errors_are_classified() {
        let io = Error::from(io::Error::other("disk full"));
        assert!(io.is_persistence());
        let bad: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(bad.is_persistence());
        assert!(bad.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn api_display_prefers_status_string() {
        let err = Error::api(409, Some("ABORTED".to_string()), "conflict");
        assert_eq!(err.to_string(), "ABORTED: conflict");
        assert_eq!(err.status_code(), Some(409));
        assert_eq!(Error::api(418, None, "teapot").to_string(), "API error: teapot");
    }

    #[test]
    fn server_errors_carry_status_and_hint() {
        let err = Error::server(503, "overloaded", Some(4));
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(
            err.to_string(),
            "Server error 503: overloaded (retry after 4 seconds)"
        );
        assert!(!Error::busy("turn in flight").is_server_error());
        assert_eq!(Error::rate_limit("slow down", None).status_code(), Some(429));
    }

    #[test]
    fn sources_are_exposed() {
        let err = Error::io("could not write", io::Error::other("full"));
        assert!(error::Error::source(&err).is_some());
        let err = Error::transport("refused", Some(Box::new(io::Error::other("refused"))));
        assert!(error::Error::source(&err).is_some());
        assert!(error::Error::source(&Error::permission("no")).is_none());
        assert_eq!(Error::permission("no").status_code(), None);
    }

    #[test]
    fn url_errors_are_validation() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.is_validation());
    }
}
