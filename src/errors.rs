use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Connection-level failure classes. Application-level errors carried in a
/// response envelope are never a `TransportError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    Parse,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{kind} error calling {url}: {cause}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub url: String,
    #[source]
    pub cause: BoxError,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, url: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            kind,
            url: url.into(),
            cause: cause.into(),
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_decode() {
            TransportErrorKind::Parse
        } else {
            TransportErrorKind::Connection
        };
        Self::new(kind, url, err)
    }

    /// Parse failures mean the platform answered; retrying would not help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Parse)
    }
}

#[derive(Debug, Error)]
pub enum FeishuError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("approval error: {0}")]
    Approval(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("platform returned code {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("message delivery failed: {0}")]
    Message(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FeishuError {
    pub fn kind(&self) -> &'static str {
        match self {
            FeishuError::Transport(e) => match e.kind {
                TransportErrorKind::Timeout => "transport_timeout",
                TransportErrorKind::Connection => "transport_connection",
                TransportErrorKind::Parse => "transport_parse",
            },
            FeishuError::Auth(_) => "auth_error",
            FeishuError::Approval(_) => "approval_error",
            FeishuError::NotFound(_) => "not_found",
            FeishuError::Api { .. } => "api_error",
            FeishuError::Message(_) => "message_error",
            FeishuError::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_names_kind_and_url() {
        let err = TransportError::new(
            TransportErrorKind::Timeout,
            "https://open.feishu.cn/x",
            "deadline elapsed",
        );
        assert_eq!(
            err.to_string(),
            "timeout error calling https://open.feishu.cn/x: deadline elapsed"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_errors_are_not_retryable() {
        let err = TransportError::new(TransportErrorKind::Parse, "u", "bad json");
        assert!(!err.is_retryable());
        let wrapped: FeishuError = err.into();
        assert_eq!(wrapped.kind(), "transport_parse");
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(FeishuError::Auth("x".into()).kind(), "auth_error");
        assert_eq!(FeishuError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            FeishuError::Api { code: 1, msg: "m".into() }.to_string(),
            "platform returned code 1: m"
        );
    }
}
