use std::fmt;

use thiserror::Error;

/// Why an extraction call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// Could not reach the proxy.
    Connect,
    /// Deadline expired; the request was aborted.
    Timeout,
    /// HTML page instead of JSON, usually an auth wall or gateway error.
    Gateway,
    /// A plain "Redirecting..." body that the protocol does not follow.
    UnexpectedRedirect,
    /// Neither JSON nor a recognizable error page.
    Malformed,
    /// Non-2xx status with a JSON error payload.
    Proxy,
    /// 2xx response whose envelope reports `success: false`.
    Rejected,
    /// Envelope parsed but `data` does not match the batch schema.
    Schema,
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connection failed",
            Self::Timeout => "timed out",
            Self::Gateway => "authentication/gateway error",
            Self::UnexpectedRedirect => "unexpected redirect",
            Self::Malformed => "malformed response",
            Self::Proxy => "proxy error",
            Self::Rejected => "extraction rejected",
            Self::Schema => "invalid extraction payload",
        };
        f.write_str(name)
    }
}

/// Failure of the remote extraction step. Aborts the whole pipeline run.
#[derive(Debug, Clone, Error)]
#[error("extraction proxy {kind}{}: {message}", status_suffix(.status))]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Failure listing ledger entities. Aborts the whole pipeline run.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("entity query transport error: {0}")]
    Transport(String),

    #[error("entity query rejected ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("entity query returned an unreadable payload: {0}")]
    Decode(String),
}

/// Failure writing one ledger record. Recovered into a per-fund outcome.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("record write transport error: {0}")]
    Transport(String),

    #[error("record write rejected ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("amount is not a finite number: {0}")]
    InvalidAmount(f64),

    #[error("record write returned an unreadable payload: {0}")]
    Decode(String),
}

/// Errors that abort a pipeline run before any outcome is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_message_includes_status() {
        let err = ExtractionError::new(ExtractionErrorKind::Proxy, "quota exceeded").with_status(429);
        assert_eq!(
            err.to_string(),
            "extraction proxy proxy error (status 429): quota exceeded"
        );

        let err = ExtractionError::new(ExtractionErrorKind::Timeout, "initial request");
        assert_eq!(err.to_string(), "extraction proxy timed out: initial request");
    }

    #[test]
    fn pipeline_error_is_transparent() {
        let err: PipelineError = DirectoryError::Transport("dns".into()).into();
        assert_eq!(err.to_string(), "entity query transport error: dns");
    }
}
