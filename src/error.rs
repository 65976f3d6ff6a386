// Error taxonomy shared by the remote client, the transfer policy and the
// scheduler. "Not found" is deliberately absent: lookups report absence
// through `remote::Lookup::NotFound` instead of failing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to the storage service or reading the
/// local files that feed it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Login was rejected. Fatal: nothing can proceed without a token.
    #[error("login rejected ({code}): {message}")]
    Auth { code: i64, message: String },

    /// Read timeout on a request. The only retryable failure.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with a non-200 `code` in its JSON envelope.
    #[error("remote error on {path} ({code}): {message}")]
    Remote {
        path: String,
        code: i64,
        message: String,
    },

    /// `PUT /fs/put` answered with a non-200 HTTP status.
    #[error("upload of {path} failed: {status} - {body}")]
    Upload {
        path: String,
        status: u16,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl ApiError {
    /// Whether the same request may simply be issued again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ApiError::Io {
            path: path.into(),
            source,
        }
    }
}

// A timeout while connecting means the host is unreachable, which retrying
// the same request will not fix; only a stalled response is transient.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() && !err.is_connect() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Http(err)
        }
    }
}
