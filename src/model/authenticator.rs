//! Authenticators
//!
//! Verification factors referenced by a response.

use serde_json::Value;
use std::sync::Arc;

use crate::capability::{CapabilityCollection, CapabilityType};

/// Authenticator type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthenticatorKind {
    Password,
    Email,
    Phone,
    SecurityQuestion,
    SecurityKey,
    App,
    Device,
    Federated,
    Unknown(String),
}

impl AuthenticatorKind {
    /// Parse the wire `type` value.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "password" => Self::Password,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "security_question" => Self::SecurityQuestion,
            "security_key" => Self::SecurityKey,
            "app" => Self::App,
            "device" => Self::Device,
            "federated" => Self::Federated,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Password => "password",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::SecurityQuestion => "security_question",
            Self::SecurityKey => "security_key",
            Self::App => "app",
            Self::Device => "device",
            Self::Federated => "federated",
            Self::Unknown(value) => value,
        }
    }
}

/// Method an authenticator supports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthenticatorMethod {
    Password,
    Email,
    Sms,
    Voice,
    Push,
    Totp,
    Otp,
    SignedNonce,
    SecurityQuestion,
    WebAuthn,
    Duo,
    Idp,
    Unknown(String),
}

impl AuthenticatorMethod {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "password" => Self::Password,
            "email" => Self::Email,
            "sms" => Self::Sms,
            "voice" => Self::Voice,
            "push" => Self::Push,
            "totp" => Self::Totp,
            "otp" => Self::Otp,
            "signed_nonce" => Self::SignedNonce,
            "security_question" => Self::SecurityQuestion,
            "webauthn" => Self::WebAuthn,
            "duo" => Self::Duo,
            "idp" => Self::Idp,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Where in the response an authenticator was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthenticatorState {
    /// Listed in `authenticators`.
    Normal,
    /// Listed in `authenticatorEnrollments`.
    Enrolled,
    /// The `currentAuthenticatorEnrollment` being challenged.
    Authenticating,
    /// The `currentAuthenticator` being enrolled.
    Enrolling,
    /// The `recoveryAuthenticator`.
    Recovery,
}

impl AuthenticatorState {
    /// Whether the authenticator is the subject of the current step.
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Authenticating | Self::Enrolling)
    }
}

/// Authenticator descriptor.
#[derive(Clone, Debug)]
pub struct Authenticator {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub kind: AuthenticatorKind,
    /// Authenticator key (`okta_email`, `google_otp`, ...).
    pub key: Option<String>,
    pub state: AuthenticatorState,
    pub methods: Vec<AuthenticatorMethod>,
    /// Server data for the current step (QR codes, WebAuthn options, Duo
    /// widget settings).
    pub contextual_data: Option<Value>,
    /// JSON paths that `relatesTo` references resolve through.
    pub json_paths: Vec<String>,
    pub capabilities: CapabilityCollection,
}

impl Authenticator {
    /// First capability of kind `T`.
    pub fn capability<T: CapabilityType>(&self) -> Option<&T> {
        self.capabilities.capability::<T>()
    }

    pub fn has_method(&self, method: &AuthenticatorMethod) -> bool {
        self.methods.contains(method)
    }
}

/// Authenticators of one response.
#[derive(Clone, Debug, Default)]
pub struct AuthenticatorCollection {
    authenticators: Vec<Arc<Authenticator>>,
}

impl AuthenticatorCollection {
    pub fn new(authenticators: Vec<Arc<Authenticator>>) -> Self {
        Self { authenticators }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Authenticator>> {
        self.authenticators.iter()
    }

    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }

    /// Authenticator being challenged or enrolled in this step.
    pub fn current(&self) -> Option<&Arc<Authenticator>> {
        self.authenticators.iter().find(|a| a.state.is_current())
    }

    pub fn by_id(&self, id: &str) -> Option<&Arc<Authenticator>> {
        self.authenticators
            .iter()
            .find(|a| a.id.as_deref() == Some(id))
    }

    pub fn of_kind(&self, kind: &AuthenticatorKind) -> Option<&Arc<Authenticator>> {
        self.authenticators.iter().find(|a| &a.kind == kind)
    }

    pub fn with_state(
        &self,
        state: AuthenticatorState,
    ) -> impl Iterator<Item = &Arc<Authenticator>> {
        self.authenticators.iter().filter(move |a| a.state == state)
    }

    /// Authenticators the user already has, other than the one in use.
    pub fn enrolled(&self) -> impl Iterator<Item = &Arc<Authenticator>> {
        self.with_state(AuthenticatorState::Enrolled)
    }

    /// Resolve a `relatesTo` JSON path.
    pub fn by_json_path(&self, path: &str) -> Option<&Arc<Authenticator>> {
        let path = normalize_json_path(path);
        self.authenticators
            .iter()
            .find(|a| a.json_paths.iter().any(|p| p == path))
    }
}

/// Single-object references may carry a trailing `.value`.
pub(crate) fn normalize_json_path(path: &str) -> &str {
    path.strip_suffix(".value").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator(id: &str, kind: &str, state: AuthenticatorState, paths: &[&str]) -> Arc<Authenticator> {
        Arc::new(Authenticator {
            id: Some(id.to_string()),
            display_name: None,
            kind: AuthenticatorKind::from_wire(kind),
            key: None,
            state,
            methods: vec![AuthenticatorMethod::from_wire(kind)],
            contextual_data: None,
            json_paths: paths.iter().map(|p| p.to_string()).collect(),
            capabilities: CapabilityCollection::default(),
        })
    }

    #[test]
    fn test_collection_lookups() {
        let collection = AuthenticatorCollection::new(vec![
            authenticator("aut1", "password", AuthenticatorState::Enrolled, &["$.authenticatorEnrollments.value[0]"]),
            authenticator(
                "aut2",
                "email",
                AuthenticatorState::Authenticating,
                &["$.authenticatorEnrollments.value[1]", "$.currentAuthenticatorEnrollment"],
            ),
        ]);

        assert_eq!(collection.current().and_then(|a| a.id.as_deref()), Some("aut2"));
        assert!(collection.of_kind(&AuthenticatorKind::Password).is_some());
        assert_eq!(collection.with_state(AuthenticatorState::Enrolled).count(), 1);
        assert_eq!(
            collection
                .by_json_path("$.currentAuthenticatorEnrollment.value")
                .and_then(|a| a.id.as_deref()),
            Some("aut2")
        );
        assert!(collection.by_json_path("$.authenticators.value[9]").is_none());
    }

    #[test]
    fn test_unknown_kind_round_trips_name() {
        let kind = AuthenticatorKind::from_wire("smart_card");
        assert_eq!(kind.as_str(), "smart_card");
    }
}
