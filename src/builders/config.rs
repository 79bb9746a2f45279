//! Configuration Builder
//!
//! Fluent builder for IDX configuration.

use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::core::{IdxEndpoints, DEFAULT_MAX_RESPONSE_SIZE};
use crate::error::{ConfigurationError, IdxError, IdxResult};
use crate::types::{
    Context, IdxConfig, IdxConfigFile, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_VERSION,
};

/// IDX configuration builder.
#[derive(Default)]
pub struct IdxConfigBuilder {
    issuer: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    scopes: Vec<String>,
    redirect_uri: Option<String>,
    version: Option<String>,
    timeout: Option<Duration>,
    auto_poll: Option<bool>,
    auto_restart_on_expiry: Option<bool>,
    default_poll_interval: Option<Duration>,
    max_response_size: Option<usize>,
    additional_parameters: HashMap<String, String>,
}

impl IdxConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set issuer.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set redirect URI.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set scopes.
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Add a scope.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Set the IDX protocol version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Start pollable capabilities automatically (default on).
    pub fn auto_poll(mut self, enable: bool) -> Self {
        self.auto_poll = Some(enable);
        self
    }

    /// Restart the interaction once when a response expires (default on).
    pub fn auto_restart_on_expiry(mut self, enable: bool) -> Self {
        self.auto_restart_on_expiry = Some(enable);
        self
    }

    /// Poll interval used when the server does not send one.
    pub fn default_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval = Some(interval);
        self
    }

    /// Cap response bodies at `bytes`.
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = Some(bytes);
        self
    }

    /// Add an extra interact parameter.
    pub fn additional_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_parameters.insert(key.into(), value.into());
        self
    }

    /// Configure from a stored configuration document.
    pub fn from_config_file(mut self, file: IdxConfigFile) -> Self {
        self.issuer = Some(file.issuer);
        self.client_id = Some(file.client_id);
        self.client_secret = file.client_secret.map(SecretString::new);
        self.redirect_uri = Some(file.redirect_uri);
        self.scopes = file.scopes.split_whitespace().map(String::from).collect();
        self
    }

    /// Configure from a persisted interaction context.
    pub fn from_context(mut self, context: &Context) -> Self {
        self.issuer = Some(context.issuer.clone());
        self.client_id = Some(context.client_id.clone());
        if !context.redirect_uri.is_empty() {
            self.redirect_uri = Some(context.redirect_uri.clone());
        }
        if !context.scopes.is_empty() {
            self.scopes = context.scopes.clone();
        }
        self
    }

    /// Build the IDX configuration.
    pub fn build(self) -> IdxResult<IdxConfig> {
        let missing = |field: &str| {
            IdxError::Configuration(ConfigurationError::MissingField {
                field: field.to_string(),
            })
        };

        let issuer = self.issuer.ok_or_else(|| missing("issuer"))?;
        let issuer = Url::parse(&issuer)
            .map_err(|_| ConfigurationError::InvalidIssuer { url: issuer.clone() })?;
        IdxEndpoints::from_issuer(&issuer)?;

        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing("client_id"))?;

        let redirect_uri = self.redirect_uri.ok_or_else(|| missing("redirect_uri"))?;
        let redirect_uri = Url::parse(&redirect_uri)
            .map_err(|_| ConfigurationError::InvalidRedirectUri { url: redirect_uri.clone() })?;

        if self.scopes.is_empty() {
            return Err(missing("scopes"));
        }

        let version = self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());
        if version != DEFAULT_VERSION {
            return Err(ConfigurationError::UnsupportedVersion { version }.into());
        }

        Ok(IdxConfig {
            issuer,
            client_id,
            client_secret: self.client_secret,
            scopes: self.scopes,
            redirect_uri,
            version,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            auto_poll: self.auto_poll.unwrap_or(true),
            auto_restart_on_expiry: self.auto_restart_on_expiry.unwrap_or(true),
            default_poll_interval: self
                .default_poll_interval
                .unwrap_or(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            max_response_size: self
                .max_response_size
                .unwrap_or(DEFAULT_MAX_RESPONSE_SIZE),
            additional_parameters: self.additional_parameters,
        })
    }
}

/// Create a new IDX configuration builder.
pub fn idx_config() -> IdxConfigBuilder {
    IdxConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> IdxConfigBuilder {
        idx_config()
            .issuer("https://example.okta.com/oauth2/default")
            .client_id("clientId")
            .redirect_uri("com.example:/callback")
            .add_scope("openid")
            .add_scope("profile")
    }

    #[test]
    fn test_builder_success() {
        let config = builder().build().unwrap();

        assert_eq!(config.client_id, "clientId");
        assert_eq!(config.scope_string(), "openid profile");
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.auto_poll);
        assert!(config.auto_restart_on_expiry);
    }

    #[test]
    fn test_builder_opt_out_of_timers() {
        let config = builder()
            .auto_poll(false)
            .auto_restart_on_expiry(false)
            .build()
            .unwrap();

        assert!(!config.auto_poll);
        assert!(!config.auto_restart_on_expiry);
    }

    #[test]
    fn test_builder_missing_client_id() {
        let result = idx_config()
            .issuer("https://example.okta.com")
            .redirect_uri("com.example:/callback")
            .add_scope("openid")
            .build();

        assert!(matches!(
            result,
            Err(IdxError::Configuration(ConfigurationError::MissingField { ref field })) if field == "client_id"
        ));
    }

    #[test]
    fn test_builder_rejects_bad_issuer() {
        let result = builder().issuer("not a url").build();
        assert!(matches!(
            result,
            Err(IdxError::Configuration(ConfigurationError::InvalidIssuer { .. }))
        ));
    }

    #[test]
    fn test_builder_rejects_unknown_version() {
        let result = builder().version("2.0.0").build();
        assert!(matches!(
            result,
            Err(IdxError::Configuration(ConfigurationError::UnsupportedVersion { .. }))
        ));
    }

    #[test]
    fn test_builder_from_config_file() {
        let file = IdxConfigFile::from_json(
            r#"{
                "issuer": "https://example.okta.com",
                "clientId": "abc",
                "clientSecret": "shh",
                "redirectUri": "com.example:/callback",
                "scopes": "openid email"
            }"#,
        )
        .unwrap();

        let config = idx_config().from_config_file(file).build().unwrap();
        assert_eq!(config.client_id, "abc");
        assert!(config.client_secret.is_some());
        assert_eq!(config.scopes, vec!["openid", "email"]);
    }
}
