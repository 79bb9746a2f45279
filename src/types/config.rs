//! Configuration Types
//!
//! IDX client configuration types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::core::IdxEndpoints;
use crate::error::IdxResult;

/// Default configuration values.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;
pub const DEFAULT_VERSION: &str = "1.0.0";

/// IDX client configuration.
#[derive(Clone)]
pub struct IdxConfig {
    /// Issuer of the authorization server.
    pub issuer: Url,
    /// Client identifier.
    pub client_id: String,
    /// Client secret (confidential clients only).
    pub client_secret: Option<SecretString>,
    /// Scopes requested at interact time.
    pub scopes: Vec<String>,
    /// Redirect URI registered for the client.
    pub redirect_uri: Url,
    /// IDX protocol version sent in `okta-version` and used to pick a decoder.
    pub version: String,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Start pollable capabilities of every new response automatically.
    pub auto_poll: bool,
    /// Cancel and restart the interaction when a response expires.
    pub auto_restart_on_expiry: bool,
    /// Poll interval used when the server does not send `refresh`.
    pub default_poll_interval: Duration,
    /// Largest response body accepted.
    pub max_response_size: usize,
    /// Extra parameters sent with the interact request
    /// (e.g. `recovery_token`, `activation_token`).
    pub additional_parameters: HashMap<String, String>,
}

impl IdxConfig {
    /// Resolve the endpoints for this issuer.
    pub fn endpoints(&self) -> IdxResult<IdxEndpoints> {
        IdxEndpoints::from_issuer(&self.issuer)
    }

    /// Scope list as sent on the wire.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl std::fmt::Debug for IdxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdxConfig")
            .field("issuer", &self.issuer.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("version", &self.version)
            .field("timeout", &self.timeout)
            .field("auto_poll", &self.auto_poll)
            .field("auto_restart_on_expiry", &self.auto_restart_on_expiry)
            .finish()
    }
}

/// Configuration document as stored alongside an application.
///
/// ```json
/// {
///   "issuer": "https://example.okta.com/oauth2/default",
///   "clientId": "0oa3en4fIMQ3ddc204w5",
///   "redirectUri": "com.example.app:/callback",
///   "scopes": "openid profile offline_access"
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdxConfigFile {
    pub issuer: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Space separated.
    #[serde(default)]
    pub scopes: String,
}

impl IdxConfigFile {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_parsing() {
        let file = IdxConfigFile::from_json(
            r#"{
                "issuer": "https://example.okta.com/oauth2/default",
                "clientId": "clientId",
                "redirectUri": "com.example:/callback",
                "scopes": "openid profile"
            }"#,
        )
        .unwrap();

        assert_eq!(file.client_id, "clientId");
        assert!(file.client_secret.is_none());
        assert_eq!(file.scopes, "openid profile");
    }
}
