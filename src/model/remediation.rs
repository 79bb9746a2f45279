//! Remediations
//!
//! A remediation is a named next step: an HTTP action plus the form that
//! becomes its request body.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use url::Url;

use crate::capability::{CapabilityCollection, CapabilityType};
use crate::core::HttpMethod;
use crate::error::{FlowError, IdxResult, ProtocolError, ValidationError};
use crate::model::{Authenticator, Field, Form, Response};

/// Known remediation names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RemediationKind {
    Identify,
    IdentifyRecovery,
    SelectIdentify,
    SelectEnrollProfile,
    EnrollProfile,
    EnrollProfileUpdate,
    ChallengeAuthenticator,
    ChallengePoll,
    SelectAuthenticatorAuthenticate,
    SelectAuthenticatorEnroll,
    SelectAuthenticatorUnlockAccount,
    SelectEnrollmentChannel,
    EnrollmentChannelData,
    EnrollAuthenticator,
    EnrollPoll,
    AuthenticatorVerificationData,
    AuthenticatorEnrollmentData,
    ReenrollAuthenticator,
    ReenrollAuthenticatorWarning,
    ResetAuthenticator,
    RedirectIdp,
    DeviceChallengePoll,
    LaunchAuthenticator,
    CancelPolling,
    Consent,
    AdminConsent,
    EmailChallengeConsent,
    RequestActivationEmail,
    UnlockAccount,
    Skip,
    Cancel,
    Issue,
    Unknown(String),
}

impl RemediationKind {
    /// Map a wire remediation name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "identify" => Self::Identify,
            "identify-recovery" => Self::IdentifyRecovery,
            "select-identify" => Self::SelectIdentify,
            "select-enroll-profile" => Self::SelectEnrollProfile,
            "enroll-profile" => Self::EnrollProfile,
            "enroll-profile-update" => Self::EnrollProfileUpdate,
            "challenge-authenticator" => Self::ChallengeAuthenticator,
            "challenge-poll" => Self::ChallengePoll,
            "select-authenticator-authenticate" => Self::SelectAuthenticatorAuthenticate,
            "select-authenticator-enroll" => Self::SelectAuthenticatorEnroll,
            "select-authenticator-unlock-account" => Self::SelectAuthenticatorUnlockAccount,
            "select-enrollment-channel" => Self::SelectEnrollmentChannel,
            "enrollment-channel-data" => Self::EnrollmentChannelData,
            "enroll-authenticator" => Self::EnrollAuthenticator,
            "enroll-poll" => Self::EnrollPoll,
            "authenticator-verification-data" => Self::AuthenticatorVerificationData,
            "authenticator-enrollment-data" => Self::AuthenticatorEnrollmentData,
            "reenroll-authenticator" => Self::ReenrollAuthenticator,
            "reenroll-authenticator-warning" => Self::ReenrollAuthenticatorWarning,
            "reset-authenticator" => Self::ResetAuthenticator,
            "redirect-idp" => Self::RedirectIdp,
            "device-challenge-poll" => Self::DeviceChallengePoll,
            "launch-authenticator" => Self::LaunchAuthenticator,
            "cancel-polling" => Self::CancelPolling,
            "consent" => Self::Consent,
            "admin-consent" => Self::AdminConsent,
            "email-challenge-consent" => Self::EmailChallengeConsent,
            "request-activation-email" => Self::RequestActivationEmail,
            "unlock-account" => Self::UnlockAccount,
            "skip" => Self::Skip,
            "cancel" => Self::Cancel,
            "issue" => Self::Issue,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Identify => "identify",
            Self::IdentifyRecovery => "identify-recovery",
            Self::SelectIdentify => "select-identify",
            Self::SelectEnrollProfile => "select-enroll-profile",
            Self::EnrollProfile => "enroll-profile",
            Self::EnrollProfileUpdate => "enroll-profile-update",
            Self::ChallengeAuthenticator => "challenge-authenticator",
            Self::ChallengePoll => "challenge-poll",
            Self::SelectAuthenticatorAuthenticate => "select-authenticator-authenticate",
            Self::SelectAuthenticatorEnroll => "select-authenticator-enroll",
            Self::SelectAuthenticatorUnlockAccount => "select-authenticator-unlock-account",
            Self::SelectEnrollmentChannel => "select-enrollment-channel",
            Self::EnrollmentChannelData => "enrollment-channel-data",
            Self::EnrollAuthenticator => "enroll-authenticator",
            Self::EnrollPoll => "enroll-poll",
            Self::AuthenticatorVerificationData => "authenticator-verification-data",
            Self::AuthenticatorEnrollmentData => "authenticator-enrollment-data",
            Self::ReenrollAuthenticator => "reenroll-authenticator",
            Self::ReenrollAuthenticatorWarning => "reenroll-authenticator-warning",
            Self::ResetAuthenticator => "reset-authenticator",
            Self::RedirectIdp => "redirect-idp",
            Self::DeviceChallengePoll => "device-challenge-poll",
            Self::LaunchAuthenticator => "launch-authenticator",
            Self::CancelPolling => "cancel-polling",
            Self::Consent => "consent",
            Self::AdminConsent => "admin-consent",
            Self::EmailChallengeConsent => "email-challenge-consent",
            Self::RequestActivationEmail => "request-activation-email",
            Self::UnlockAccount => "unlock-account",
            Self::Skip => "skip",
            Self::Cancel => "cancel",
            Self::Issue => "issue",
            Self::Unknown(name) => name,
        }
    }
}

/// Receiver of remediation submissions, normally the flow that parsed the
/// response.
#[async_trait]
pub trait RemediationHandler: Send + Sync {
    /// Submit as a flow step.
    async fn proceed(&self, remediation: &Remediation) -> IdxResult<Response>;

    /// Submit without changing flow state.
    async fn poll(&self, remediation: &Remediation) -> IdxResult<Response>;

    /// A background poll finished with a response that ends polling, or
    /// with an error.
    fn poll_completed(&self, generation: u64, result: IdxResult<Response>);
}

/// A submittable next step.
#[derive(Clone)]
pub struct Remediation {
    pub kind: RemediationKind,
    pub name: String,
    pub method: HttpMethod,
    pub href: Url,
    /// Request content type.
    pub accepts: Option<String>,
    /// Poll interval advertised by the server.
    pub refresh: Option<Duration>,
    /// Authenticators referenced through `relatesTo`.
    pub relates_to: Vec<Arc<Authenticator>>,
    pub form: Form,
    pub capabilities: CapabilityCollection,
    generation: u64,
    handler: Option<Weak<dyn RemediationHandler>>,
}

impl Remediation {
    pub fn new(name: impl Into<String>, method: HttpMethod, href: Url, form: Form) -> Self {
        let name = name.into();
        Self {
            kind: RemediationKind::from_name(&name),
            name,
            method,
            href,
            accepts: None,
            refresh: None,
            relates_to: Vec::new(),
            form,
            capabilities: CapabilityCollection::default(),
            generation: 0,
            handler: None,
        }
    }

    /// Attach to the response generation and handler that produced it.
    pub(crate) fn bind(&mut self, generation: u64, handler: Option<Weak<dyn RemediationHandler>>) {
        self.generation = generation;
        self.handler = handler;
    }

    /// Generation of the response this remediation belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn RemediationHandler>> {
        self.handler.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn weak_handler(&self) -> Option<Weak<dyn RemediationHandler>> {
        self.handler.clone()
    }

    /// Primary related authenticator.
    pub fn authenticator(&self) -> Option<&Arc<Authenticator>> {
        self.relates_to.first()
    }

    pub fn get(&self, path: &str) -> Option<&Field> {
        self.form.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Field> {
        self.form.get_mut(path)
    }

    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        self.form.set_value(path, value)
    }

    /// First capability of kind `T`.
    pub fn capability<T: CapabilityType>(&self) -> Option<&T> {
        self.capabilities.capability::<T>()
    }

    /// Content type the request body is encoded with.
    pub fn content_type(&self) -> &str {
        self.accepts.as_deref().unwrap_or("application/json")
    }

    pub fn is_form_encoded(&self) -> bool {
        self.content_type()
            .contains("application/x-www-form-urlencoded")
    }

    /// Validate the form and encode it per `accepts`.
    pub fn request_body(&self) -> IdxResult<String> {
        let values = self.form.to_json()?;

        if self.is_form_encoded() {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in &values {
                match value {
                    Value::String(s) => serializer.append_pair(key, s),
                    Value::Null => serializer.append_pair(key, ""),
                    other => serializer.append_pair(key, &other.to_string()),
                };
            }
            return Ok(serializer.finish());
        }

        serde_json::to_string(&values).map_err(|e| {
            ProtocolError::CannotCreateRequest {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Submit through the flow that produced this remediation.
    pub async fn proceed(&self) -> IdxResult<Response> {
        let handler = self.handler().ok_or(FlowError::NotAuthenticating)?;
        handler.proceed(self).await
    }
}

impl std::fmt::Debug for Remediation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remediation")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("href", &self.href.as_str())
            .field("accepts", &self.accepts)
            .field("form", &self.form)
            .field("capabilities", &self.capabilities)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Remediations of one response, in server order.
#[derive(Clone, Debug, Default)]
pub struct RemediationCollection {
    remediations: Vec<Remediation>,
}

impl RemediationCollection {
    pub fn new(remediations: Vec<Remediation>) -> Self {
        Self { remediations }
    }

    /// First remediation with the given wire name.
    pub fn get(&self, name: &str) -> Option<&Remediation> {
        self.remediations.iter().find(|r| r.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Remediation> {
        self.remediations.iter_mut().find(|r| r.name == name)
    }

    /// First remediation of the given kind.
    pub fn of_kind(&self, kind: &RemediationKind) -> Option<&Remediation> {
        self.remediations.iter().find(|r| &r.kind == kind)
    }

    pub fn of_kind_mut(&mut self, kind: &RemediationKind) -> Option<&mut Remediation> {
        self.remediations.iter_mut().find(|r| &r.kind == kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.remediations.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Remediation> {
        self.remediations.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Remediation> {
        self.remediations.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.remediations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remediations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remediation(name: &str) -> Remediation {
        Remediation::new(
            name,
            HttpMethod::Post,
            Url::parse("https://example.okta.com/idp/idx/identify").unwrap(),
            Form::new(vec![
                Field::scalar("identifier", None).with_required(true),
                Field::scalar("stateHandle", Some(json!("02abc"))).with_mutable(false),
            ]),
        )
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(
            RemediationKind::from_name("select-authenticator-enroll"),
            RemediationKind::SelectAuthenticatorEnroll
        );
        assert_eq!(
            RemediationKind::from_name("future-step").as_str(),
            "future-step"
        );
    }

    #[test]
    fn test_lookup_is_first_wins() {
        let mut first = remediation("identify");
        first.set_value("identifier", "first").unwrap();
        let mut second = remediation("identify");
        second.set_value("identifier", "second").unwrap();

        let collection = RemediationCollection::new(vec![first, second]);
        let found = collection.get("identify").unwrap();
        assert_eq!(found.get("identifier").unwrap().value(), Some(&json!("first")));
        assert!(collection.of_kind(&RemediationKind::Identify).is_some());
        assert!(collection.get("cancel").is_none());
    }

    #[test]
    fn test_json_request_body() {
        let mut remediation = remediation("identify");
        assert!(remediation.request_body().is_err());

        remediation.set_value("identifier", "mary").unwrap();
        let body: Value = serde_json::from_str(&remediation.request_body().unwrap()).unwrap();
        assert_eq!(body, json!({ "identifier": "mary", "stateHandle": "02abc" }));
    }

    #[test]
    fn test_form_encoded_request_body() {
        let mut remediation = Remediation::new(
            "issue",
            HttpMethod::Post,
            Url::parse("https://example.okta.com/oauth2/v1/token").unwrap(),
            Form::new(vec![
                Field::scalar("grant_type", Some(json!("interaction_code"))),
                Field::scalar("interaction_code", Some(json!("a b"))),
            ]),
        );
        remediation.accepts = Some("application/x-www-form-urlencoded".to_string());

        assert_eq!(
            remediation.request_body().unwrap(),
            "grant_type=interaction_code&interaction_code=a+b"
        );
    }

    #[tokio::test]
    async fn test_unbound_remediation_cannot_proceed() {
        let remediation = remediation("identify");
        assert!(remediation.proceed().await.is_err());
    }
}
