//! Token Types
//!
//! Tokens issued at the end of a successful interaction.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

/// Token response from the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// ID token (OIDC).
    #[serde(default)]
    pub id_token: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token bundle handed to the caller after a successful exchange.
#[derive(Clone)]
pub struct Token {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    /// Token type.
    pub token_type: String,
    /// ID token (OIDC).
    pub id_token: Option<String>,
    /// Lifetime in seconds as reported by the server.
    pub expires_in: Option<u64>,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

impl Token {
    /// Build from a token endpoint response.
    pub fn from_response(response: TokenResponse) -> Self {
        let scopes = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Self {
            access_token: SecretString::new(response.access_token),
            refresh_token: response.refresh_token.map(SecretString::new),
            token_type: response.token_type,
            id_token: response.id_token,
            expires_in: response.expires_in,
            scopes,
            issued_at: Utc::now(),
        }
    }

    /// Access token value.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Refresh token value.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Expiration time; `None` when unknown or out of range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        self.issued_at.checked_add_signed(Duration::try_seconds(secs)?)
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose_secret())
    }

    /// Decode the ID token claims without verifying the signature.
    ///
    /// Only suitable for display; verification belongs to the resource server.
    #[cfg(feature = "jwt")]
    pub fn id_token_claims<T: serde::de::DeserializeOwned>(
        &self,
    ) -> crate::error::IdxResult<Option<T>> {
        let Some(id_token) = &self.id_token else {
            return Ok(None);
        };

        let mut validation = jsonwebtoken::Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<T>(
            id_token,
            &jsonwebtoken::DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(|e| crate::error::ProtocolError::InvalidResponseData {
            message: format!("malformed id_token: {}", e),
        })?;

        Ok(Some(data.claims))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
