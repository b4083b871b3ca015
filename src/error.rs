use std::time::Duration;

use crate::attempt::{Attempt, ErrorKind};

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// DNS, connect, TLS or reset error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The attempt did not complete within the per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP 5xx or 429 with the raw response body.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    /// HTTP 4xx (other than 429) with the raw response body.
    #[error("client error {status}: {body}")]
    Client { status: u16, body: String },
    /// Response framing could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
}

impl Failure {
    /// Returns the classified error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::Client { .. } => ErrorKind::Client,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Returns the HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The retry policy was rejected before any attempt was made.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The underlying HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Setup(#[source] reqwest::Error),
    /// A non-retryable failure ended the call.
    #[error("terminal failure on attempt {}: {failure}", .history.len())]
    Terminal {
        #[source]
        failure: Failure,
        history: Vec<Attempt>,
    },
    /// A retryable failure whose delivery is unknown, on a request that
    /// must not be resent without an idempotency key.
    #[error("delivery unknown after attempt {}, retry suppressed: {failure}", .history.len())]
    Ambiguous {
        #[source]
        failure: Failure,
        history: Vec<Attempt>,
    },
    /// Every permitted attempt failed with a retryable error.
    #[error("retries exhausted after {} attempts: {last}", .history.len())]
    Exhausted {
        #[source]
        last: Failure,
        history: Vec<Attempt>,
    },
    /// The caller cancelled the call or its deadline passed.
    #[error("cancelled by caller after {} attempts", .history.len())]
    Cancelled { history: Vec<Attempt> },
}

impl TransportError {
    /// Returns the attempt trail recorded before the error surfaced.
    pub fn history(&self) -> &[Attempt] {
        match self {
            Self::InvalidPolicy(_) | Self::InvalidRequest(_) | Self::Setup(_) => &[],
            Self::Terminal { history, .. }
            | Self::Ambiguous { history, .. }
            | Self::Exhausted { history, .. }
            | Self::Cancelled { history } => history,
        }
    }

    /// Number of HTTP attempts made.
    pub fn attempts(&self) -> usize {
        self.history().len()
    }

    /// Returns the failure that ended the call, if one was recorded.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Terminal { failure, .. } | Self::Ambiguous { failure, .. } => Some(failure),
            Self::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// Returns the classified kind of the final failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Cancelled { .. } => Some(ErrorKind::Cancelled),
            other => other.failure().map(Failure::kind),
        }
    }

    /// Whether this error came from retries running out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Whether the caller's cancellation or deadline ended the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
