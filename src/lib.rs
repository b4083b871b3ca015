//! `corebank-transport` is the retrying SOAP/XML transport shared by
//! core-banking, instant-payment and wallet gateway calls.
//!
//! The entry points are:
//! - [`Transport::send`] / [`Transport::send_in`]: POST an opaque envelope
//!   under a [`RetryPolicy`], optionally bounded by a [`CallContext`]
//! - [`GatewayClient::call`] / [`GatewayClient::call_in`]: route an
//!   [`Operation`] to its gateway with the operation's retry policy
//!
//! Business outcomes inside a delivered SOAP body are never treated as
//! transport errors; parse [`TransportResponse::body`] to find them.

mod attempt;
mod backoff;
mod classify;
mod client;
mod config;
mod error;
mod operation;
mod options;
mod policy;
mod transport;

pub use attempt::{Attempt, ErrorKind, Outcome};
pub use backoff::Backoff;
pub use client::GatewayClient;
pub use config::{Auth, ConfigError, Endpoint, GatewayConfig};
pub use error::{Failure, TransportError};
pub use operation::{Channel, Operation};
pub use options::{TransportOptions, DEFAULT_IDEMPOTENCY_HEADER};
pub use policy::{
    RetryPolicy, RetryPolicyBuilder, RetrySafety, LEGACY_ATTEMPT_TIMEOUT, LEGACY_MAX_ATTEMPTS,
};
pub use transport::{CallContext, SoapRequest, Transport, TransportResponse, SOAP_CONTENT_TYPE};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, TransportError>;
