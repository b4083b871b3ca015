use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    StatusCode, Url,
};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    attempt::{Attempt, ErrorKind, Outcome},
    classify::{classify_status, classify_transport, is_failure_status, Classified, Delivery},
    Result, RetryPolicy, RetrySafety, TransportError, TransportOptions,
};

/// Content type of a SOAP 1.1 envelope.
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// One logical POST: endpoint, opaque envelope bytes and headers.
///
/// The body and headers are sent unchanged on every attempt.
#[derive(Clone)]
pub struct SoapRequest {
    endpoint: String,
    body: Bytes,
    headers: HeaderMap,
    idempotency_key: Option<String>,
}

impl fmt::Debug for SoapRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<_> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if name == header::AUTHORIZATION {
                    "<redacted>"
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                (name.as_str(), value)
            })
            .collect();
        f.debug_struct("SoapRequest")
            .field("endpoint", &self.endpoint)
            .field("body_len", &self.body.len())
            .field("headers", &headers)
            .field("idempotency_key", &self.idempotency_key)
            .finish()
    }
}

impl SoapRequest {
    /// Creates a request with `Content-Type: text/xml; charset=utf-8`.
    pub fn new(endpoint: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));
        Self {
            endpoint: endpoint.into(),
            body: body.into(),
            headers,
            idempotency_key: None,
        }
    }

    /// Sets a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from strings, rejecting invalid names or values.
    pub fn try_with_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| TransportError::InvalidRequest(format!("header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| TransportError::InvalidRequest(format!("header '{name}' value: {err}")))?;
        Ok(self.with_header(name, value))
    }

    /// Merges `headers` over the current ones.
    ///
    /// Every name present in `headers` replaces all of its previous values;
    /// repeated values for that name are all kept.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        let mut current: Option<HeaderName> = None;
        for (name, value) in headers {
            if let Some(name) = name {
                self.headers.remove(&name);
                current = Some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    /// Attaches a stable key the upstream can deduplicate retries on.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }
}

/// Caller-side cancellation and deadline for one logical call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties the call to an existing cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once the token is cancelled or the deadline passes.
    async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

/// Raw HTTP response of the winning attempt.
///
/// The SOAP body is not interpreted; business failures inside it are for
/// the caller's parser.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    history: Vec<Attempt>,
}

impl TransportResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Number of attempts it took, including the successful one.
    pub fn attempts(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[Attempt] {
        &self.history
    }
}

struct Received {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Retrying, timeout-bounded POST transport.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone, Debug)]
pub struct Transport {
    http: reqwest::Client,
    idempotency_header: HeaderName,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Creates a transport with a default `reqwest` client.
    pub fn new() -> Self {
        Self::from_client(reqwest::Client::new())
    }

    /// Creates a transport over an existing client, sharing its pool.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self {
            http,
            idempotency_header: HeaderName::from_static("idempotency-key"),
        }
    }

    /// Creates a transport with pool, connect and header options applied.
    pub fn with_options(opts: TransportOptions) -> Result<Self> {
        let idempotency_header = HeaderName::from_bytes(opts.idempotency_header.as_bytes())
            .map_err(|err| {
                TransportError::InvalidRequest(format!(
                    "idempotency header name '{}': {err}",
                    opts.idempotency_header
                ))
            })?;
        let http = opts.build_client().map_err(TransportError::Setup)?;
        Ok(Self {
            http,
            idempotency_header,
        })
    }

    /// Sends `request` under `policy` with no caller cancellation.
    pub async fn send(&self, request: &SoapRequest, policy: &RetryPolicy) -> Result<TransportResponse> {
        self.send_in(&CallContext::new(), request, policy).await
    }

    /// Sends `request` under `policy`, stopping as soon as `ctx` is done.
    pub async fn send_in(
        &self,
        ctx: &CallContext,
        request: &SoapRequest,
        policy: &RetryPolicy,
    ) -> Result<TransportResponse> {
        let url = Url::parse(request.endpoint()).map_err(|err| {
            TransportError::InvalidRequest(format!("endpoint '{}': {err}", request.endpoint()))
        })?;
        let headers = self.attempt_headers(request)?;
        let resend_when_unknown =
            policy.safety() == RetrySafety::SafeToRetry || request.idempotency_key.is_some();

        let max_attempts = policy.max_attempts();
        let mut history = Vec::new();
        let mut attempt = 1u32;

        loop {
            if ctx.is_done() {
                return Err(TransportError::Cancelled { history });
            }

            let started_at = SystemTime::now();
            let clock = Instant::now();
            let result = tokio::select! {
                biased;
                _ = ctx.done() => None,
                result = self.attempt_once(
                    url.clone(),
                    headers.clone(),
                    request.body.clone(),
                    policy.per_attempt_timeout(),
                ) => Some(result),
            };
            let elapsed = clock.elapsed();

            let record = |outcome: Outcome, error: Option<ErrorKind>, status: Option<u16>| Attempt {
                index: attempt,
                started_at,
                elapsed,
                outcome,
                error,
                status,
            };

            let classified = match result {
                None => {
                    history.push(record(Outcome::TerminalFailure, Some(ErrorKind::Cancelled), None));
                    return Err(TransportError::Cancelled { history });
                }
                Some(Ok(received)) => {
                    history.push(record(Outcome::Success, None, Some(received.status.as_u16())));
                    return Ok(TransportResponse {
                        status: received.status,
                        headers: received.headers,
                        body: received.body,
                        history,
                    });
                }
                Some(Err(classified)) => classified,
            };

            let Classified {
                failure,
                retryable,
                delivery,
            } = classified;
            let suppressed = retryable && delivery == Delivery::Unknown && !resend_when_unknown;
            let outcome = if retryable && !suppressed {
                Outcome::RetryableFailure
            } else {
                Outcome::TerminalFailure
            };
            history.push(record(outcome, Some(failure.kind()), failure.status()));

            if !retryable {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, endpoint = %url, "terminal failure: {failure}");
                return Err(TransportError::Terminal { failure, history });
            }
            if suppressed {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempt,
                    endpoint = %url,
                    "not resending request without idempotency key after ambiguous failure: {failure}"
                );
                return Err(TransportError::Ambiguous { failure, history });
            }
            if attempt >= max_attempts {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, endpoint = %url, "retries exhausted: {failure}");
                return Err(TransportError::Exhausted {
                    last: failure,
                    history,
                });
            }

            let delay = policy.backoff().delay(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                endpoint = %url,
                "retrying after {failure}"
            );

            tokio::select! {
                biased;
                _ = ctx.done() => return Err(TransportError::Cancelled { history }),
                _ = sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn attempt_headers(&self, request: &SoapRequest) -> Result<HeaderMap> {
        let mut headers = request.headers.clone();
        if let Some(key) = &request.idempotency_key {
            let value = HeaderValue::from_str(key).map_err(|err| {
                TransportError::InvalidRequest(format!("idempotency key: {err}"))
            })?;
            headers.insert(self.idempotency_header.clone(), value);
        }
        Ok(headers)
    }

    /// Performs one POST and reads the whole body.
    ///
    /// The body is read even for failure statuses so the connection goes
    /// back to the pool before the next attempt.
    async fn attempt_once(
        &self,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> std::result::Result<Received, Classified> {
        let response = self
            .http
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|err| classify_transport(err, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| classify_transport(err, timeout))?;

        if is_failure_status(status) {
            return Err(classify_status(
                status,
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        Ok(Received {
            status,
            headers,
            body,
        })
    }
}
