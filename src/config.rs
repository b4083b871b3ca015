//! Gateway endpoints and credentials, passed explicitly to
//! [`crate::GatewayClient::new`].

use std::{collections::HashMap, fmt};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::operation::{Channel, Operation};

/// Error raised while loading a [`GatewayConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(&'static str),
    #[error("{0} is set but empty")]
    Empty(&'static str),
    #[error("{set} is set but {missing} is not")]
    Incomplete {
        set: &'static str,
        missing: &'static str,
    },
    #[error("invalid gateway config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authorization attached to every call on a channel.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    Basic { username: String, password: String },
    /// Bearer token; the `Bearer ` prefix is optional.
    Bearer { token: String },
    /// Sent verbatim as the `Authorization` value.
    Raw { value: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Self::Raw { .. } => f.debug_struct("Raw").field("value", &"<redacted>").finish(),
        }
    }
}

impl Auth {
    /// Renders the `Authorization` header value.
    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            Self::Bearer { token } => normalize_bearer_authorization(token),
            Self::Raw { value } => value.clone(),
        }
    }
}

/// One upstream gateway.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    #[serde(default)]
    pub auth: Option<Auth>,
    /// `SOAPAction` header per [`Operation::name`].
    #[serde(default)]
    pub soap_actions: HashMap<String, String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
            soap_actions: HashMap::new(),
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_soap_action(mut self, operation: Operation, action: impl Into<String>) -> Self {
        self.soap_actions
            .insert(operation.name().to_owned(), action.into());
        self
    }

    pub fn soap_action(&self, operation: Operation) -> Option<&str> {
        self.soap_actions.get(operation.name()).map(String::as_str)
    }
}

/// Endpoints for every channel the client may call.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    pub core_banking: Endpoint,
    #[serde(default)]
    pub ips: Option<Endpoint>,
    #[serde(default)]
    pub wallet: Option<Endpoint>,
}

impl GatewayConfig {
    pub fn new(core_banking: Endpoint) -> Self {
        Self {
            core_banking,
            ips: None,
            wallet: None,
        }
    }

    pub fn with_ips(mut self, endpoint: Endpoint) -> Self {
        self.ips = Some(endpoint);
        self
    }

    pub fn with_wallet(mut self, endpoint: Endpoint) -> Self {
        self.wallet = Some(endpoint);
        self
    }

    pub fn endpoint(&self, channel: Channel) -> Option<&Endpoint> {
        match channel {
            Channel::CoreBanking => Some(&self.core_banking),
            Channel::Ips => self.ips.as_ref(),
            Channel::Wallet => self.wallet.as_ref(),
        }
    }

    /// Parses a JSON document shaped like this struct.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `COREBANK_URL` (required), with optional `COREBANK_USERNAME` and
    ///   `COREBANK_PASSWORD` for basic auth
    /// - `COREBANK_IPS_URL` and `COREBANK_IPS_TOKEN`
    /// - `COREBANK_WALLET_URL` and `COREBANK_WALLET_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(key)),
                Some(value) => Ok(Some(value.trim().to_owned())),
                None => Ok(None),
            }
        };

        let url = get("COREBANK_URL")?.ok_or(ConfigError::Missing("COREBANK_URL"))?;
        let mut core_banking = Endpoint::new(url);
        match (get("COREBANK_USERNAME")?, get("COREBANK_PASSWORD")?) {
            (Some(username), Some(password)) => {
                core_banking = core_banking.with_auth(Auth::Basic { username, password });
            }
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    set: "COREBANK_USERNAME",
                    missing: "COREBANK_PASSWORD",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    set: "COREBANK_PASSWORD",
                    missing: "COREBANK_USERNAME",
                })
            }
            (None, None) => {}
        }

        let mut config = Self::new(core_banking);
        if let Some(url) = get("COREBANK_IPS_URL")? {
            let mut ips = Endpoint::new(url);
            if let Some(token) = get("COREBANK_IPS_TOKEN")? {
                ips = ips.with_auth(Auth::Bearer { token });
            }
            config = config.with_ips(ips);
        }
        if let Some(url) = get("COREBANK_WALLET_URL")? {
            let mut wallet = Endpoint::new(url);
            if let Some(token) = get("COREBANK_WALLET_TOKEN")? {
                wallet = wallet.with_auth(Auth::Bearer { token });
            }
            config = config.with_wallet(wallet);
        }
        Ok(config)
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{normalize_bearer_authorization, Auth, ConfigError, GatewayConfig};
    use crate::operation::{Channel, Operation};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn basic_auth_is_base64_encoded() {
        let auth = Auth::Basic {
            username: "teller".to_owned(),
            password: "s3cret".to_owned(),
        };
        assert_eq!(auth.header_value(), "Basic dGVsbGVyOnMzY3JldA==");
    }

    #[test]
    fn debug_redacts_credentials() {
        let auth = Auth::Basic {
            username: "teller".to_owned(),
            password: "s3cret".to_owned(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn from_lookup_reads_all_channels() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("COREBANK_URL", "https://core/ws"),
            ("COREBANK_USERNAME", "teller"),
            ("COREBANK_PASSWORD", "pw"),
            ("COREBANK_IPS_URL", "https://ips/ws"),
            ("COREBANK_IPS_TOKEN", "ips-token"),
            ("COREBANK_WALLET_URL", "https://wallet/ws"),
        ]))
        .expect("config must load");

        assert_eq!(config.core_banking.url, "https://core/ws");
        assert!(matches!(config.core_banking.auth, Some(Auth::Basic { .. })));
        let ips = config.endpoint(Channel::Ips).expect("ips endpoint");
        assert_eq!(
            ips.auth.as_ref().map(Auth::header_value),
            Some("Bearer ips-token".to_owned())
        );
        let wallet = config.endpoint(Channel::Wallet).expect("wallet endpoint");
        assert!(wallet.auth.is_none());
    }

    #[test]
    fn from_lookup_requires_core_url() {
        let err = GatewayConfig::from_lookup(lookup(&[])).expect_err("url is required");
        assert!(matches!(err, ConfigError::Missing("COREBANK_URL")));
    }

    #[test]
    fn from_lookup_rejects_empty_and_half_credentials() {
        let err = GatewayConfig::from_lookup(lookup(&[("COREBANK_URL", "  ")]))
            .expect_err("empty url must fail");
        assert!(matches!(err, ConfigError::Empty("COREBANK_URL")));

        let err = GatewayConfig::from_lookup(lookup(&[
            ("COREBANK_URL", "https://core/ws"),
            ("COREBANK_USERNAME", "teller"),
        ]))
        .expect_err("username without password must fail");
        assert!(matches!(err, ConfigError::Incomplete { .. }));
    }

    #[test]
    fn from_json_parses_auth_and_soap_actions() {
        let config = GatewayConfig::from_json_str(
            r#"{
                "core_banking": {
                    "url": "https://core/ws",
                    "auth": { "type": "basic", "username": "u", "password": "p" },
                    "soap_actions": { "fund_transfer": "urn:FundTransfer" }
                },
                "wallet": {
                    "url": "https://wallet/ws",
                    "auth": { "type": "bearer", "token": "t" }
                }
            }"#,
        )
        .expect("json must parse");

        assert_eq!(
            config.core_banking.soap_action(Operation::FundTransfer),
            Some("urn:FundTransfer")
        );
        assert!(config.ips.is_none());
        assert!(config.wallet.is_some());
    }

    #[test]
    fn from_json_reports_invalid_documents() {
        let err = GatewayConfig::from_json_str("{}").expect_err("core_banking is required");
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
