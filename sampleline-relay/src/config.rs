use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{error::RelayError, origin::normalize_origin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// The single origin whose pages may use the relay.
    pub trusted_origin: String,
    /// Target URLs must start with one of these.
    pub allowed_prefixes: Vec<String>,
    pub upstream_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            trusted_origin: "https://oric.games".to_string(),
            allowed_prefixes: vec![
                "https://www.defence-force.org/".to_string(),
                "https://cdn.oric.org/".to_string(),
            ],
            upstream_timeout_secs: 30,
        }
    }
}

impl RelayConfig {
    /// Check the config and return it with the trusted origin in canonical
    /// form.
    ///
    /// # Errors
    /// `RelayError::InvalidConfig` when the trusted origin is not an http(s)
    /// origin, a prefix is not an absolute http(s) URL, or no prefix is set.
    pub fn validated(mut self) -> Result<Self, RelayError> {
        self.trusted_origin = normalize_origin(&self.trusted_origin).ok_or_else(|| {
            RelayError::InvalidConfig(format!("trusted origin '{}'", self.trusted_origin))
        })?;

        if self.allowed_prefixes.is_empty() {
            return Err(RelayError::InvalidConfig(
                "at least one upstream prefix is required".into(),
            ));
        }
        for prefix in &self.allowed_prefixes {
            let parsed = Url::parse(prefix)
                .map_err(|e| RelayError::InvalidConfig(format!("upstream prefix '{prefix}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(RelayError::InvalidConfig(format!(
                    "upstream prefix '{prefix}' is not an http(s) URL"
                )));
            }
        }

        self.upstream_timeout_secs = self.upstream_timeout_secs.clamp(1, 600);
        Ok(self)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
