use thiserror::Error;

/// HTTP error information captured from reqwest.
///
/// `reqwest::Error` is not `Clone`, and transport failures have to be shared between
/// every observer of a coalesced request, so only the facts we act on are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpErrorInfo {
    /// Error message.
    pub message: String,
    /// Whether the error was a timeout.
    pub is_timeout: bool,
    /// Whether the error was a connection failure.
    pub is_connect: bool,
}

impl From<&reqwest::Error> for HttpErrorInfo {
    fn from(err: &reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            is_timeout: err.is_timeout(),
            is_connect: err.is_connect(),
        }
    }
}

/// Error type for a single transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No HTTP response was received.
    #[error("Network error: {}", .0.message)]
    Network(HttpErrorInfo),

    /// The backend answered with a non-2xx status.
    #[error("HTTP status {status} with body: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, decoded lossily.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The endpoint URL could not be formed from the base host.
    #[error("Invalid endpoint: {0}")]
    Endpoint(String),
}

impl TransportError {
    /// Returns `true` when no HTTP response was received.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Encode(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(HttpErrorInfo::from(&err))
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TransportError::Network(HttpErrorInfo {
            message: "connection refused".to_string(),
            is_timeout: false,
            is_connect: true,
        });
        assert_eq!(err.to_string(), "Network error: connection refused");
        assert!(err.is_network());

        let err = TransportError::Status {
            status: 400,
            body: "{}".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP status 400 with body: {}");
        assert!(!err.is_network());
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(TransportError::from(err), TransportError::Decode(_)));
    }
}
