use reqwest::StatusCode;

use crate::Failure;

/// Whether the upstream may have acted on a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The request never left this process (connect-phase failure).
    NotSent,
    /// The upstream answered that it did not process the request.
    Rejected,
    /// The request may have been processed.
    Unknown,
}

#[derive(Debug)]
pub(crate) struct Classified {
    pub failure: Failure,
    pub retryable: bool,
    pub delivery: Delivery,
}

impl Classified {
    fn retryable(failure: Failure, delivery: Delivery) -> Self {
        Self {
            failure,
            retryable: true,
            delivery,
        }
    }

    fn terminal(failure: Failure) -> Self {
        Self {
            failure,
            retryable: false,
            delivery: Delivery::Unknown,
        }
    }
}

/// Whether a received status is a failure at the transport level.
pub(crate) fn is_failure_status(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Classifies a failure status. Callers check [`is_failure_status`] first.
pub(crate) fn classify_status(status: StatusCode, body: String) -> Classified {
    let code = status.as_u16();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Classified::retryable(Failure::Server { status: code, body }, Delivery::Rejected);
    }
    if status.is_server_error() {
        return Classified::retryable(Failure::Server { status: code, body }, Delivery::Unknown);
    }
    Classified::terminal(Failure::Client { status: code, body })
}

/// Classifies a `reqwest` error raised while sending or reading a response.
pub(crate) fn classify_transport(
    err: reqwest::Error,
    timeout: std::time::Duration,
) -> Classified {
    let connect = err.is_connect();
    if err.is_timeout() {
        return classify_timeout(timeout, connect);
    }
    if connect {
        return Classified::retryable(Failure::Network(err), Delivery::NotSent);
    }
    if err.is_decode() || err.is_redirect() || err.is_builder() {
        return Classified::terminal(Failure::MalformedResponse(err));
    }
    // Resets after the request was written and connections dropped mid-body.
    Classified::retryable(Failure::Network(err), Delivery::Unknown)
}

/// A connect-phase timeout never wrote the request.
fn classify_timeout(timeout: std::time::Duration, connect: bool) -> Classified {
    let delivery = if connect {
        Delivery::NotSent
    } else {
        Delivery::Unknown
    };
    Classified::retryable(Failure::Timeout(timeout), delivery)
}
