//! Client configuration and environment loading.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, EndpointAddress, resolve};

pub const API_KEY_VAR: &str = "GENAI_API_KEY";
pub const ENDPOINT_VAR: &str = "GENAI_ENDPOINT";
pub const HOST_VAR: &str = "GENAI_HOST";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_key: String,
    #[serde(default)]
    pub endpoint: Endpoint,
    /// Only used with [`Endpoint::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: Endpoint::default(),
            host: None,
            connect_timeout: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Reads `GENAI_API_KEY`, `GENAI_ENDPOINT` and `GENAI_HOST`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let Some(api_key) = lookup(API_KEY_VAR).filter(|key| !key.is_empty()) else {
            bail!("{API_KEY_VAR} is not set");
        };
        let endpoint = match lookup(ENDPOINT_VAR) {
            Some(name) if !name.is_empty() => name
                .parse::<Endpoint>()
                .with_context(|| format!("invalid {ENDPOINT_VAR}"))?,
            _ => Endpoint::default(),
        };
        Ok(Self {
            api_key,
            endpoint,
            host: lookup(HOST_VAR).filter(|host| !host.is_empty()),
            connect_timeout: None,
        })
    }

    pub fn resolve(&self) -> genai_protocol::GenaiResult<EndpointAddress> {
        resolve(self.endpoint, self.host.as_deref())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_defaults_to_gemini_api() {
        let config = ClientConfig::from_lookup(lookup(&[(API_KEY_VAR, "k")])).unwrap();
        assert_eq!(config, ClientConfig::new("k"));
        assert_eq!(config.endpoint, Endpoint::GeminiApi);
    }

    #[test]
    fn env_reads_endpoint_and_host() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "k"),
            (ENDPOINT_VAR, "custom"),
            (HOST_VAR, "localhost:50051"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, Endpoint::Custom);
        assert_eq!(config.resolve().unwrap().address, "localhost:50051");
    }

    #[test]
    fn env_requires_api_key() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(API_KEY_VAR));
    }

    #[test]
    fn env_rejects_unknown_endpoint() {
        let err = ClientConfig::from_lookup(lookup(&[(API_KEY_VAR, "k"), (ENDPOINT_VAR, "nope")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENDPOINT_VAR));
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("k"));
    }
}
