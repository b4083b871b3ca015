use std::time::Duration;

/// Default header carrying the caller's idempotency key.
pub const DEFAULT_IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Configures the pooled HTTP client behind a [`crate::Transport`].
///
/// Per-attempt timeouts and retry counts live on [`crate::RetryPolicy`],
/// not here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportOptions {
    /// TCP + TLS connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// How long an idle pooled connection is kept, in milliseconds.
    pub pool_idle_timeout_ms: u64,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Header name used for [`crate::SoapRequest::idempotency_key`].
    pub idempotency_header: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            pool_idle_timeout_ms: 90_000,
            pool_max_idle_per_host: 8,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            idempotency_header: DEFAULT_IDEMPOTENCY_HEADER.to_owned(),
        }
    }
}

impl TransportOptions {
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .pool_idle_timeout(Duration::from_millis(self.pool_idle_timeout_ms))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(self.user_agent.clone())
            .build()
    }
}
