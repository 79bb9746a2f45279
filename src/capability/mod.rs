//! Capabilities
//!
//! Optional behaviors attached to remediations and authenticators. Callers
//! ask for a kind with [`CapabilityCollection::capability`] and act on it if
//! present. Kinds this crate does not know about are carried as
//! [`Capability::Extension`] values contributed by a [`CapabilityFactory`].

pub mod duo;
pub mod pollable;
pub mod profile;
pub mod sendable;
pub mod social_idp;
pub mod webauthn;

pub use duo::Duo;
pub use pollable::Pollable;
pub use profile::{PasswordAge, PasswordComplexity, PasswordRequirement, PasswordSettings, Profile};
pub use sendable::{Recoverable, Resendable, Sendable};
pub use social_idp::{SocialIdp, SocialIdpService};
pub use webauthn::{WebAuthnAuthentication, WebAuthnRegistration};

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use crate::model::{Authenticator, Remediation};

/// A capability of a remediation or authenticator.
#[derive(Clone, Debug)]
pub enum Capability {
    Sendable(Sendable),
    Resendable(Resendable),
    Recoverable(Recoverable),
    Pollable(Pollable),
    Profile(Profile),
    PasswordSettings(PasswordSettings),
    SocialIdp(SocialIdp),
    WebAuthnRegistration(WebAuthnRegistration),
    WebAuthnAuthentication(WebAuthnAuthentication),
    Duo(Duo),
    Extension(Arc<dyn ExtensionCapability>),
}

/// Capability kinds that can be looked up by type.
pub trait CapabilityType: Sized {
    fn from_capability(capability: &Capability) -> Option<&Self>;
}

macro_rules! capability_kinds {
    ($($kind:ident),* $(,)?) => {
        $(
            impl CapabilityType for $kind {
                fn from_capability(capability: &Capability) -> Option<&Self> {
                    match capability {
                        Capability::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$kind> for Capability {
                fn from(inner: $kind) -> Self {
                    Capability::$kind(inner)
                }
            }
        )*
    };
}

capability_kinds!(
    Sendable,
    Resendable,
    Recoverable,
    Pollable,
    Profile,
    PasswordSettings,
    SocialIdp,
    WebAuthnRegistration,
    WebAuthnAuthentication,
    Duo,
);

/// Capability kind defined outside this crate.
pub trait ExtensionCapability: Any + Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Ordered capability list.
#[derive(Clone, Debug, Default)]
pub struct CapabilityCollection {
    capabilities: Vec<Capability>,
}

impl CapabilityCollection {
    pub fn new(capabilities: Vec<Capability>) -> Self {
        Self { capabilities }
    }

    pub fn push(&mut self, capability: impl Into<Capability>) {
        self.capabilities.push(capability.into());
    }

    pub fn extend(&mut self, capabilities: impl IntoIterator<Item = Capability>) {
        self.capabilities.extend(capabilities);
    }

    /// First capability of kind `T`.
    pub fn capability<T: CapabilityType>(&self) -> Option<&T> {
        self.capabilities.iter().find_map(T::from_capability)
    }

    pub fn has<T: CapabilityType>(&self) -> bool {
        self.capability::<T>().is_some()
    }

    /// First extension capability of concrete type `T`.
    pub fn extension<T: ExtensionCapability>(&self) -> Option<&T> {
        self.capabilities.iter().find_map(|capability| match capability {
            Capability::Extension(extension) => extension.as_any().downcast_ref::<T>(),
            _ => None,
        })
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Contributes capabilities while a response is parsed.
///
/// Factories see the parsed entity and its raw wire object, and run after
/// the built-in capabilities are attached.
pub trait CapabilityFactory: Send + Sync {
    fn remediation_capabilities(&self, _remediation: &Remediation, _raw: &Value) -> Vec<Capability> {
        Vec::new()
    }

    fn authenticator_capabilities(
        &self,
        _authenticator: &Authenticator,
        _raw: &Value,
    ) -> Vec<Capability> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct Attestation {
        nonce: String,
    }

    impl ExtensionCapability for Attestation {
        fn name(&self) -> &str {
            "attestation"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_lookup_by_kind() {
        let mut collection = CapabilityCollection::default();
        collection.push(Profile::new(BTreeMap::from([(
            "email".to_string(),
            "m***@example.com".to_string(),
        )])));

        assert!(collection.capability::<Profile>().is_some());
        assert!(collection.capability::<Pollable>().is_none());
        assert!(!collection.has::<PasswordSettings>());
    }

    #[test]
    fn test_first_of_kind_wins() {
        let mut collection = CapabilityCollection::default();
        collection.push(Profile::new(BTreeMap::from([("n".to_string(), "1".to_string())])));
        collection.push(Profile::new(BTreeMap::from([("n".to_string(), "2".to_string())])));

        assert_eq!(
            collection.capability::<Profile>().and_then(|p| p.get("n")),
            Some("1")
        );
    }

    #[test]
    fn test_extension_lookup() {
        let collection = CapabilityCollection::new(vec![Capability::Extension(Arc::new(
            Attestation {
                nonce: "abc".to_string(),
            },
        ))]);

        let attestation = collection.extension::<Attestation>().unwrap();
        assert_eq!(attestation.nonce, "abc");
        assert_eq!(attestation.name(), "attestation");
        assert!(collection.capability::<Profile>().is_none());
    }
}
