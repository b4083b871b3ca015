use std::time::{Duration, SystemTime};

/// Classified cause of a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// DNS, connect, TLS, or connection reset.
    Network,
    /// The attempt exceeded its per-attempt timeout.
    Timeout,
    /// HTTP 5xx or 429.
    Server,
    /// HTTP 4xx other than 429.
    Client,
    /// Undecodable response framing.
    MalformedResponse,
    /// Cancelled by the caller while in flight.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RetryableFailure,
    TerminalFailure,
}

/// Record of one HTTP try within a logical call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt index.
    pub index: u32,
    /// Wall-clock time the attempt started.
    pub started_at: SystemTime,
    /// Time from start until the attempt resolved.
    pub elapsed: Duration,
    pub outcome: Outcome,
    /// Set for every failed attempt.
    pub error: Option<ErrorKind>,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
}

impl Attempt {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}
