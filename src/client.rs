use std::{collections::HashMap, fmt};

use bytes::Bytes;
use reqwest::header::{self, HeaderName, HeaderValue};

use crate::{
    config::ConfigError, CallContext, GatewayConfig, Operation, Result, RetryPolicy, SoapRequest,
    Transport, TransportError, TransportResponse,
};

#[derive(Clone)]
/// Sends banking SOAP envelopes to the gateway that owns each operation.
///
/// Envelope construction and response parsing stay with the caller; this
/// client only routes, authorizes and applies the operation's retry policy.
pub struct GatewayClient {
    transport: Transport,
    config: GatewayConfig,
    policies: HashMap<Operation, RetryPolicy>,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("policies", &self.policies)
            .finish()
    }
}

impl GatewayClient {
    /// Creates a client over a default [`Transport`].
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            transport: Transport::new(),
            config,
            policies: HashMap::new(),
        }
    }

    /// Creates a client from `COREBANK_*` environment variables.
    ///
    /// See [`GatewayConfig::from_env`] for the variables read.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(GatewayConfig::from_env()?))
    }

    /// Replaces the transport, e.g. one built with [`Transport::with_options`].
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Overrides the retry policy for one operation.
    pub fn with_policy(mut self, operation: Operation, policy: RetryPolicy) -> Self {
        self.policies.insert(operation, policy);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Policy applied to `operation`: the override if set, else its default.
    pub fn policy(&self, operation: Operation) -> RetryPolicy {
        self.policies
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| operation.default_policy())
    }

    /// Builds the request for `operation` without sending it.
    pub fn request(&self, operation: Operation, envelope: impl Into<Bytes>) -> Result<SoapRequest> {
        let channel = operation.channel();
        let endpoint = self.config.endpoint(channel).ok_or_else(|| {
            TransportError::InvalidRequest(format!(
                "no {channel:?} endpoint configured for {}",
                operation.name()
            ))
        })?;

        let mut request = SoapRequest::new(endpoint.url.clone(), envelope);
        if let Some(action) = endpoint.soap_action(operation) {
            let value = HeaderValue::from_str(action).map_err(|err| {
                TransportError::InvalidRequest(format!("SOAPAction for {}: {err}", operation.name()))
            })?;
            request = request.with_header(HeaderName::from_static("soapaction"), value);
        }
        if let Some(auth) = &endpoint.auth {
            let mut value = HeaderValue::from_str(&auth.header_value()).map_err(|err| {
                TransportError::InvalidRequest(format!("authorization for {channel:?}: {err}"))
            })?;
            value.set_sensitive(true);
            request = request.with_header(header::AUTHORIZATION, value);
        }
        Ok(request)
    }

    /// Sends `envelope` for `operation` with no caller cancellation.
    pub async fn call(
        &self,
        operation: Operation,
        envelope: impl Into<Bytes>,
    ) -> Result<TransportResponse> {
        self.call_in(&CallContext::new(), operation, envelope, None)
            .await
    }

    /// Sends `envelope` for `operation` within `ctx`.
    ///
    /// Pass the transaction reference as `idempotency_key` for money
    /// movement; without it an ambiguous failure is not retried.
    pub async fn call_in(
        &self,
        ctx: &CallContext,
        operation: Operation,
        envelope: impl Into<Bytes>,
        idempotency_key: Option<&str>,
    ) -> Result<TransportResponse> {
        let mut request = self.request(operation, envelope)?;
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }
        let policy = self.policy(operation);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            operation = operation.name(),
            endpoint = request.endpoint(),
            max_attempts = policy.max_attempts(),
            "sending gateway call"
        );

        self.transport.send_in(ctx, &request, &policy).await
    }
}
