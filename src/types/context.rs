//! Interaction Context
//!
//! Persistable per-interaction state. Everything needed to resume an
//! interaction after a process restart lives here.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{ConfigurationError, IdxResult};
use crate::types::IdxConfig;

const KEY_ISSUER: &str = "issuer";
const KEY_CLIENT_ID: &str = "clientId";
const KEY_REDIRECT_URI: &str = "redirectUri";
const KEY_SCOPES: &str = "scopes";
const KEY_STATE: &str = "state";
const KEY_CODE_VERIFIER: &str = "codeVerifier";
const KEY_INTERACTION_HANDLE: &str = "interactionHandle";

/// Interaction context.
///
/// Serializes to a flat string map; `Debug` never prints the nonce, the
/// verifier or the interaction handle.
#[derive(Clone)]
pub struct Context {
    /// Issuer the interaction was started against.
    pub issuer: String,
    /// Client identifier.
    pub client_id: String,
    /// Redirect URI used for the interaction.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    state: String,
    code_verifier: SecretString,
    interaction_handle: SecretString,
}

impl Context {
    /// Create a context for an interaction started with `config`.
    pub fn new(
        config: &IdxConfig,
        state: impl Into<String>,
        code_verifier: impl Into<String>,
        interaction_handle: impl Into<String>,
    ) -> Self {
        Self {
            issuer: config.issuer.to_string(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.to_string(),
            scopes: config.scopes.clone(),
            state: state.into(),
            code_verifier: SecretString::new(code_verifier.into()),
            interaction_handle: SecretString::new(interaction_handle.into()),
        }
    }

    /// State nonce bound to this interaction.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// PKCE code verifier.
    pub fn code_verifier(&self) -> &str {
        self.code_verifier.expose_secret()
    }

    /// Server-issued interaction handle.
    pub fn interaction_handle(&self) -> &str {
        self.interaction_handle.expose_secret()
    }

    /// Flatten into a string map.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        [
            (KEY_ISSUER, self.issuer.clone()),
            (KEY_CLIENT_ID, self.client_id.clone()),
            (KEY_REDIRECT_URI, self.redirect_uri.clone()),
            (KEY_SCOPES, self.scopes.join(" ")),
            (KEY_STATE, self.state.clone()),
            (KEY_CODE_VERIFIER, self.code_verifier().to_string()),
            (KEY_INTERACTION_HANDLE, self.interaction_handle().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Rebuild from a string map produced by [`Context::to_map`].
    pub fn from_map(map: &BTreeMap<String, String>) -> IdxResult<Self> {
        let get = |key: &str| -> IdxResult<String> {
            map.get(key).cloned().ok_or_else(|| {
                ConfigurationError::MissingField {
                    field: key.to_string(),
                }
                .into()
            })
        };

        Ok(Self {
            issuer: get(KEY_ISSUER)?,
            client_id: get(KEY_CLIENT_ID)?,
            redirect_uri: map.get(KEY_REDIRECT_URI).cloned().unwrap_or_default(),
            scopes: map
                .get(KEY_SCOPES)
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            state: get(KEY_STATE)?,
            code_verifier: SecretString::new(get(KEY_CODE_VERIFIER)?),
            interaction_handle: SecretString::new(get(KEY_INTERACTION_HANDLE)?),
        })
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        Context::from_map(&map).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("state", &"[REDACTED]")
            .field("code_verifier", &"[REDACTED]")
            .field("interaction_handle", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_map() -> BTreeMap<String, String> {
        [
            ("issuer", "issuer"),
            ("clientId", "clientId"),
            ("redirectUri", "redirect:/uri"),
            ("scopes", "openid profile"),
            ("state", "state"),
            ("codeVerifier", "bar"),
            ("interactionHandle", "foo"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_context_from_map() {
        let context = Context::from_map(&fixture_map()).unwrap();
        assert_eq!(context.issuer, "issuer");
        assert_eq!(context.state(), "state");
        assert_eq!(context.code_verifier(), "bar");
        assert_eq!(context.interaction_handle(), "foo");
        assert_eq!(context.scopes, vec!["openid", "profile"]);
        assert_eq!(context.to_map(), fixture_map());
    }

    #[test]
    fn test_context_json_is_flat() {
        let context = Context::from_map(&fixture_map()).unwrap();
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["codeVerifier"], "bar");
        assert!(json.as_object().unwrap().values().all(|v| v.is_string()));

        let restored: Context = serde_json::from_value(json).unwrap();
        assert_eq!(restored.interaction_handle(), "foo");
    }

    #[test]
    fn test_context_missing_key() {
        let mut map = fixture_map();
        map.remove("codeVerifier");
        assert!(Context::from_map(&map).is_err());
    }

    #[test]
    fn test_context_debug_is_redacted() {
        let context = Context::from_map(&fixture_map()).unwrap();
        let debug = format!("{:?}", context);
        assert!(!debug.contains("bar"));
        assert!(!debug.contains("foo"));
        assert!(!debug.contains("\"state\""));
    }
}
