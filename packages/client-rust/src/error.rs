//! Error taxonomy for API calls, cache entries, and optimistic controls.
//!
//! [`ApiError`] is what fallible operations return. [`ErrorInfo`] is the
//! cloneable snapshot stored on cache entries so rendering code reads errors
//! as state instead of handling them as control flow.

use serde::Deserialize;

/// Failure of a client operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never completed or its body could not be read.
    #[error("{message}")]
    Transport { message: String },
    /// The transport timeout layer gave up on the request.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// An authenticated call was attempted with nobody signed in.
    #[error("User must be authenticated")]
    Unauthenticated,
    /// Input was rejected before any request was issued.
    #[error("{message}")]
    Validation { message: String },
    /// The server answered with a non-2xx status.
    #[error("{detail}")]
    Server { status: u16, detail: String },
    /// A 2xx body did not have the expected shape.
    #[error("unexpected response body: {message}")]
    Decode { message: String },
    /// The identity provider failed to produce a user or token.
    #[error("{message}")]
    Identity { message: String },
    /// The same submission is already in flight; nothing was sent.
    #[error("A request for this action is already in progress")]
    InProgress,
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Timeout,
    Unauthenticated,
    Validation,
    Server,
    Decode,
    Identity,
    InProgress,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    /// Maps a non-2xx response to a server error.
    ///
    /// The body's `detail` string is used verbatim; anything else falls back
    /// to `"Request failed with status <code>"`.
    #[must_use]
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let detail = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .map(|b| b.detail)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Self::Server { status, detail }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Server { .. } => ErrorKind::Server,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Identity { .. } => ErrorKind::Identity,
            Self::InProgress => ErrorKind::InProgress,
        }
    }

    /// HTTP status for server errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller should send the user to sign in instead of showing the message.
    #[must_use]
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Server { status: 401, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Stored form of an error on a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl From<&ApiError> for ErrorInfo {
    fn from(err: &ApiError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

impl From<ApiError> for ErrorInfo {
    fn from(err: ApiError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_surfaced_verbatim() {
        let err = ApiError::from_status(500, br#"{"detail":"internal error"}"#);
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn unparseable_body_falls_back_to_status_text() {
        let err = ApiError::from_status(502, b"<html>bad gateway</html>");
        assert_eq!(err.to_string(), "Request failed with status 502");

        let err = ApiError::from_status(404, b"{}");
        assert_eq!(err.to_string(), "Request failed with status 404");
    }

    #[test]
    fn sign_in_classification() {
        assert!(ApiError::Unauthenticated.requires_sign_in());
        assert!(ApiError::from_status(401, b"").requires_sign_in());
        assert!(!ApiError::from_status(403, b"").requires_sign_in());
    }

    #[test]
    fn error_info_snapshot() {
        let info = ErrorInfo::from(ApiError::validation("Playlist name is required"));
        assert_eq!(info.kind, ErrorKind::Validation);
        assert_eq!(info.message, "Playlist name is required");
        assert!(info.status.is_none());
    }

    proptest::proptest! {
        #[test]
        fn any_detail_string_round_trips(status in 400u16..600, detail in "[^\\\\\"]{1,40}") {
            let body = serde_json::json!({ "detail": detail }).to_string();
            let err = ApiError::from_status(status, body.as_bytes());
            proptest::prop_assert_eq!(err, ApiError::Server { status, detail });
        }

        #[test]
        fn non_json_bodies_use_status_text(status in 400u16..600, body in "[a-z <>/]{0,40}") {
            let err = ApiError::from_status(status, body.as_bytes());
            proptest::prop_assert_eq!(err.to_string(), format!("Request failed with status {status}"));
        }
    }
}
