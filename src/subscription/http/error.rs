//! Normalized errors for queries and mutations.
//!
//! Every transport failure is reduced to one of two shapes before it reaches a caller:
//!
//! - [`QueryError::Network`]: no response was received (connection refused, timeout,
//!   aborted). These are published once on the client's process-wide notice channel
//!   ([`Notice`]) and are never handed to a per-call error handler.
//! - [`QueryError::Response`]: the backend (or client-side validation) rejected the
//!   request. The payload is the backend's `{ errorCode, message }` body, which is
//!   what per-call `on_error` handlers receive.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

/// Error codes the backend and this client are known to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Payload failed validation.
    NotValid,
    /// Uploaded file exceeds the size limit.
    UploadSize,
    /// Category is still referenced by recipes.
    CategoryDelete,
    /// No response was received.
    Network,
    /// Request rejected without a decodable error body.
    BadRequest,
    /// Response could not be understood.
    BadResponse,
    /// Any other code.
    Other(String),
}

impl ErrorCode {
    pub const NOT_VALID: &'static str = "NOT_VALID_ERROR";
    pub const UPLOAD_SIZE: &'static str = "UPLOAD_SIZE_ERROR";
    pub const CATEGORY_DELETE: &'static str = "CATEGORY_DELETE_ERROR";
    pub const NETWORK: &'static str = "ERR_NETWORK";
    pub const BAD_REQUEST: &'static str = "ERR_BAD_REQUEST";
    pub const BAD_RESPONSE: &'static str = "ERR_BAD_RESPONSE";

    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotValid => Self::NOT_VALID,
            Self::UploadSize => Self::UPLOAD_SIZE,
            Self::CategoryDelete => Self::CATEGORY_DELETE,
            Self::Network => Self::NETWORK,
            Self::BadRequest => Self::BAD_REQUEST,
            Self::BadResponse => Self::BAD_RESPONSE,
            Self::Other(code) => code.as_str(),
        }
    }

    /// Returns `true` for business codes with a user-facing message.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::NotValid | Self::UploadSize | Self::CategoryDelete)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            Self::NOT_VALID => Self::NotValid,
            Self::UPLOAD_SIZE => Self::UploadSize,
            Self::CATEGORY_DELETE => Self::CategoryDelete,
            Self::NETWORK => Self::Network,
            Self::BAD_REQUEST => Self::BadRequest,
            Self::BAD_RESPONSE => Self::BadResponse,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRes {
    pub error_code: String,
    pub message: String,
}

impl ErrorRes {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the classified error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from(self.error_code.as_str())
    }

    /// Text to show the user.
    ///
    /// Known business codes carry a localized backend message. Anything else gets a
    /// diagnostic placeholder naming the code.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.code().is_known() {
            self.message.clone()
        } else {
            format!("Not implemented : {}", self.error_code)
        }
    }
}

/// Error type for query and mutation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No response was received.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request was rejected.
    #[error("{}: {}", .0.error_code, .0.message)]
    Response(ErrorRes),
}

impl QueryError {
    /// Returns `true` when no response was received.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns the backend error body, if any.
    #[must_use]
    pub const fn response(&self) -> Option<&ErrorRes> {
        match self {
            Self::Response(res) => Some(res),
            Self::Network { .. } => None,
        }
    }

    /// Returns the classified error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } => ErrorCode::Network,
            Self::Response(res) => res.code(),
        }
    }
}

impl From<ErrorRes> for QueryError {
    fn from(res: ErrorRes) -> Self {
        Self::Response(res)
    }
}

impl From<TransportError> for QueryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(info) => Self::Network {
                message: info.message,
            },
            TransportError::Status { status, body } => {
                let res = serde_json::from_str::<ErrorRes>(&body).unwrap_or_else(|_| {
                    let code = if (400..500).contains(&status) {
                        ErrorCode::BAD_REQUEST
                    } else {
                        ErrorCode::BAD_RESPONSE
                    };
                    ErrorRes::new(code, format!("HTTP {status}: {body}"))
                });
                Self::Response(res)
            }
            TransportError::Decode(message) => {
                Self::Response(ErrorRes::new(ErrorCode::BAD_RESPONSE, message))
            }
            TransportError::Encode(message) | TransportError::Endpoint(message) => {
                Self::Response(ErrorRes::new(ErrorCode::BAD_REQUEST, message))
            }
        }
    }
}

/// Process-wide notices that are not tied to any single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A request failed because the backend could not be reached.
    NetworkUnreachable { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpErrorInfo;

    #[test]
    fn test_error_code_round_trip() {
        for code in [
            "NOT_VALID_ERROR",
            "UPLOAD_SIZE_ERROR",
            "CATEGORY_DELETE_ERROR",
            "ERR_NETWORK",
            "ERR_BAD_REQUEST",
            "ERR_BAD_RESPONSE",
            "SOMETHING_NEW",
        ] {
            assert_eq!(ErrorCode::from(code).as_str(), code);
        }
        assert_eq!(
            ErrorCode::from("SOMETHING_NEW"),
            ErrorCode::Other("SOMETHING_NEW".to_string())
        );
    }

    #[test]
    fn test_error_res_deserializes_camel_case() {
        let res: ErrorRes = serde_json::from_str(
            r#"{"errorCode":"NOT_VALID_ERROR","message":"카테고리 명을 입력해 주세요."}"#,
        )
        .expect("error body");
        assert_eq!(res.code(), ErrorCode::NotValid);
        assert_eq!(res.message, "카테고리 명을 입력해 주세요.");
    }

    #[test]
    fn test_user_message() {
        let known = ErrorRes::new("CATEGORY_DELETE_ERROR", "레시피가 존재합니다.");
        assert_eq!(known.user_message(), "레시피가 존재합니다.");

        let unknown = ErrorRes::new("DB_ERROR", "boom");
        assert_eq!(unknown.user_message(), "Not implemented : DB_ERROR");
    }

    #[test]
    fn test_network_classification() {
        let err = QueryError::from(TransportError::Network(HttpErrorInfo {
            message: "connection refused".to_string(),
            is_timeout: false,
            is_connect: true,
        }));
        assert!(err.is_network());
        assert_eq!(err.code(), ErrorCode::Network);
        assert!(err.response().is_none());
    }

    #[test]
    fn test_status_with_error_body() {
        let err = QueryError::from(TransportError::Status {
            status: 400,
            body: r#"{"errorCode":"UPLOAD_SIZE_ERROR","message":"too big"}"#.to_string(),
        });
        assert_eq!(
            err,
            QueryError::Response(ErrorRes::new("UPLOAD_SIZE_ERROR", "too big"))
        );
    }

    #[test]
    fn test_status_without_error_body() {
        let err = QueryError::from(TransportError::Status {
            status: 404,
            body: "not found".to_string(),
        });
        assert_eq!(err.code(), ErrorCode::BadRequest);

        let err = QueryError::from(TransportError::Status {
            status: 502,
            body: String::new(),
        });
        assert_eq!(err.code(), ErrorCode::BadResponse);
        assert_eq!(err.to_string(), "ERR_BAD_RESPONSE: HTTP 502: ");
    }

    #[test]
    fn test_local_failures_are_responses() {
        let err = QueryError::from(TransportError::Decode("eof".to_string()));
        assert_eq!(err.code(), ErrorCode::BadResponse);

        let err = QueryError::from(TransportError::Endpoint("bad".to_string()));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }
}
