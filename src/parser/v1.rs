//! IDX 1.0.0 Decoder
//!
//! Wire types for `application/ion+json; okta-version=1.0.0` documents and
//! their conversion into the response model.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::capability::{
    Capability, CapabilityCollection, CapabilityFactory, Duo, PasswordSettings, Pollable, Profile,
    Recoverable, Resendable, Sendable, SocialIdp, SocialIdpService, WebAuthnAuthentication,
    WebAuthnRegistration,
};
use crate::core::HttpMethod;
use crate::error::{IdxResult, ProtocolError};
use crate::model::{
    App, Authenticator, AuthenticatorCollection, AuthenticatorKind, AuthenticatorMethod,
    AuthenticatorState, Field, FieldValue, Form, Intent, Message, MessageCollection,
    MessageSeverity, Remediation, RemediationCollection, RemediationKind, Response, User,
};
use crate::parser::{ParseContext, ResponseDecoder};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IonResponse {
    version: Option<String>,
    state_handle: Option<String>,
    intent: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    remediation: Option<IonCollection<Value>>,
    messages: Option<IonCollection<IonMessage>>,
    authenticators: Option<IonCollection<Value>>,
    authenticator_enrollments: Option<IonCollection<Value>>,
    current_authenticator: Option<IonObject<Value>>,
    current_authenticator_enrollment: Option<IonObject<Value>>,
    recovery_authenticator: Option<IonObject<Value>>,
    user: Option<IonObject<IonUser>>,
    app: Option<IonObject<IonApp>>,
    success_with_interaction_code: Option<Value>,
    cancel: Option<Value>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct IonCollection<T> {
    #[serde(default)]
    value: Vec<T>,
}

#[derive(Deserialize)]
struct IonObject<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelatesTo {
    Many(Vec<String>),
    One(String),
}

impl RelatesTo {
    fn paths(&self) -> Vec<&str> {
        match self {
            Self::Many(paths) => paths.iter().map(String::as_str).collect(),
            Self::One(path) => vec![path.as_str()],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IonForm {
    name: String,
    method: Option<String>,
    href: String,
    accepts: Option<String>,
    refresh: Option<f64>,
    relates_to: Option<RelatesTo>,
    #[serde(default)]
    value: Vec<IonField>,
    #[serde(rename = "type")]
    kind: Option<String>,
    idp: Option<IonIdp>,
}

#[derive(Deserialize)]
struct IonIdp {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IonField {
    name: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<Value>,
    required: Option<bool>,
    visible: Option<bool>,
    mutable: Option<bool>,
    secret: Option<bool>,
    options: Option<Vec<IonField>>,
    form: Option<IonCollection<IonField>>,
    relates_to: Option<RelatesTo>,
    messages: Option<IonCollection<IonMessage>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IonAuthenticator {
    id: Option<String>,
    display_name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    key: Option<String>,
    #[serde(default)]
    methods: Vec<IonMethod>,
    profile: Option<BTreeMap<String, Value>>,
    settings: Option<Value>,
    contextual_data: Option<Value>,
    send: Option<Value>,
    resend: Option<Value>,
    poll: Option<Value>,
    recover: Option<Value>,
}

#[derive(Deserialize)]
struct IonMethod {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct IonMessage {
    message: String,
    i18n: Option<IonI18n>,
    class: Option<String>,
}

#[derive(Deserialize)]
struct IonI18n {
    key: Option<String>,
}

#[derive(Deserialize)]
struct IonUser {
    id: Option<String>,
    identifier: Option<String>,
    #[serde(default)]
    profile: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct IonApp {
    id: Option<String>,
    label: Option<String>,
    name: Option<String>,
}

/// Decoder for protocol version `1.0.0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct V1Decoder;

impl ResponseDecoder for V1Decoder {
    fn version(&self) -> &str {
        "1.0.0"
    }

    fn decode(
        &self,
        document: Value,
        context: &ParseContext,
        factories: &[Arc<dyn CapabilityFactory>],
    ) -> IdxResult<Response> {
        let wire: IonResponse = from_value(document)?;
        Builder { context, factories }.response(wire)
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> IdxResult<T> {
    serde_json::from_value(value).map_err(|e| {
        ProtocolError::InvalidResponseData {
            message: e.to_string(),
        }
        .into()
    })
}

/// Authenticator entry before capabilities are attached.
struct PendingAuthenticator {
    raw: Value,
    state: AuthenticatorState,
    paths: Vec<String>,
}

struct Builder<'a> {
    context: &'a ParseContext,
    factories: &'a [Arc<dyn CapabilityFactory>],
}

impl Builder<'_> {
    fn response(&self, wire: IonResponse) -> IdxResult<Response> {
        let authenticators = self.authenticators(&wire)?;

        let mut remediations = Vec::new();
        for raw in wire.remediation.map(|c| c.value).unwrap_or_default() {
            remediations.push(self.remediation(raw, &authenticators)?);
        }

        let cancel_remediation = wire
            .cancel
            .map(|raw| self.remediation(raw, &authenticators))
            .transpose()?;
        let success_remediation = wire
            .success_with_interaction_code
            .map(|raw| self.remediation(raw, &authenticators))
            .transpose()?;

        remediations.extend(cancel_remediation.iter().cloned());
        remediations.extend(success_remediation.iter().cloned());

        Ok(Response {
            version: wire.version.unwrap_or_else(|| "1.0.0".to_string()),
            state_handle: wire.state_handle,
            intent: wire.intent.as_deref().map(Intent::from_wire),
            expires_at: wire.expires_at,
            remediations: RemediationCollection::new(remediations),
            authenticators,
            messages: messages(wire.messages),
            user: wire.user.map(|u| User {
                id: u.value.id,
                identifier: u.value.identifier,
                profile: u.value.profile,
            }),
            app: wire.app.map(|a| App {
                id: a.value.id,
                label: a.value.label,
                name: a.value.name,
            }),
            cancel_remediation,
            success_remediation,
            generation: self.context.generation,
        })
    }

    fn authenticators(&self, wire: &IonResponse) -> IdxResult<AuthenticatorCollection> {
        let mut pending: Vec<PendingAuthenticator> = Vec::new();

        let lists = [
            ("authenticators", AuthenticatorState::Normal, &wire.authenticators),
            (
                "authenticatorEnrollments",
                AuthenticatorState::Enrolled,
                &wire.authenticator_enrollments,
            ),
        ];
        for (key, state, collection) in lists {
            for (index, raw) in collection.iter().flat_map(|c| c.value.iter()).enumerate() {
                pending.push(PendingAuthenticator {
                    raw: raw.clone(),
                    state,
                    paths: vec![format!("$.{}.value[{}]", key, index)],
                });
            }
        }

        let singles = [
            (
                "currentAuthenticatorEnrollment",
                AuthenticatorState::Authenticating,
                AuthenticatorState::Enrolled,
                &wire.current_authenticator_enrollment,
            ),
            (
                "currentAuthenticator",
                AuthenticatorState::Enrolling,
                AuthenticatorState::Normal,
                &wire.current_authenticator,
            ),
            (
                "recoveryAuthenticator",
                AuthenticatorState::Recovery,
                AuthenticatorState::Enrolled,
                &wire.recovery_authenticator,
            ),
        ];
        for (key, state, listed_as, object) in singles {
            let Some(object) = object else { continue };
            let path = format!("$.{}", key);
            let id = object.value.get("id").and_then(Value::as_str);

            let existing = id.and_then(|id| {
                let same_id = |p: &PendingAuthenticator| {
                    p.raw.get("id").and_then(Value::as_str) == Some(id)
                };
                pending
                    .iter()
                    .position(|p| same_id(p) && p.state == listed_as)
                    .or_else(|| pending.iter().position(same_id))
            });

            match existing {
                Some(index) => {
                    let entry = &mut pending[index];
                    merge_objects(&mut entry.raw, &object.value);
                    entry.state = state;
                    entry.paths.push(path);
                }
                None => pending.push(PendingAuthenticator {
                    raw: object.value.clone(),
                    state,
                    paths: vec![path],
                }),
            }
        }

        let mut authenticators = Vec::with_capacity(pending.len());
        for entry in pending {
            authenticators.push(Arc::new(self.authenticator(entry)?));
        }
        Ok(AuthenticatorCollection::new(authenticators))
    }

    fn authenticator(&self, entry: PendingAuthenticator) -> IdxResult<Authenticator> {
        let wire: IonAuthenticator = from_value(entry.raw.clone())?;
        let no_authenticators = AuthenticatorCollection::default();

        let kind = AuthenticatorKind::from_wire(&wire.kind);
        let mut capabilities = CapabilityCollection::default();

        if let Some(raw) = wire.send {
            capabilities.push(Sendable::new(self.remediation(raw, &no_authenticators)?));
        }
        if let Some(raw) = wire.resend {
            capabilities.push(Resendable::new(self.remediation(raw, &no_authenticators)?));
        }
        if let Some(raw) = wire.poll {
            let remediation = self.remediation(raw, &no_authenticators)?;
            let interval = remediation
                .refresh
                .unwrap_or(self.context.default_poll_interval);
            capabilities.push(Pollable::new(remediation, interval));
        }
        if let Some(raw) = wire.recover {
            capabilities.push(Recoverable::new(self.remediation(raw, &no_authenticators)?));
        }
        if let Some(profile) = wire.profile {
            let values = profile
                .into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect();
            capabilities.push(Profile::new(values));
        }
        if kind == AuthenticatorKind::Password {
            if let Some(settings) = wire.settings {
                match serde_json::from_value::<PasswordSettings>(settings) {
                    Ok(settings) => capabilities.push(settings),
                    Err(e) => trace!(error = %e, "Ignoring unreadable password settings"),
                }
            }
        }

        let mut authenticator = Authenticator {
            id: wire.id,
            display_name: wire.display_name,
            kind,
            key: wire.key,
            state: entry.state,
            methods: wire
                .methods
                .iter()
                .map(|m| AuthenticatorMethod::from_wire(&m.kind))
                .collect(),
            contextual_data: wire.contextual_data,
            json_paths: entry.paths,
            capabilities,
        };

        let extra: Vec<Capability> = self
            .factories
            .iter()
            .flat_map(|f| f.authenticator_capabilities(&authenticator, &entry.raw))
            .collect();
        authenticator.capabilities.extend(extra);

        Ok(authenticator)
    }

    fn remediation(
        &self,
        raw: Value,
        authenticators: &AuthenticatorCollection,
    ) -> IdxResult<Remediation> {
        let wire: IonForm = from_value(raw.clone())?;

        let method_name = wire.method.as_deref().unwrap_or("POST");
        let method =
            HttpMethod::parse(method_name).ok_or_else(|| ProtocolError::InvalidResponseData {
                message: format!("unsupported method {} on {}", method_name, wire.name),
            })?;
        let href = Url::parse(&wire.href).map_err(|e| ProtocolError::InvalidResponseData {
            message: format!("invalid href on {}: {}", wire.name, e),
        })?;

        let fields = wire
            .value
            .into_iter()
            .map(|field| self.field(field, authenticators))
            .collect();

        let mut remediation = Remediation::new(wire.name, method, href, Form::new(fields));
        remediation.accepts = wire.accepts;
        remediation.refresh = wire
            .refresh
            .filter(|ms| *ms > 0.0)
            .map(|ms| Duration::from_millis(ms as u64));
        remediation.relates_to = wire
            .relates_to
            .as_ref()
            .map(|r| resolve(r, authenticators))
            .unwrap_or_default();
        remediation.bind(self.context.generation, self.context.handler.clone());

        let mut capabilities = Vec::new();

        if let Some(refresh) = remediation.refresh {
            capabilities.push(Capability::Pollable(Pollable::new(remediation.clone(), refresh)));
        }

        if remediation.kind == RemediationKind::RedirectIdp {
            let (id, name) = wire
                .idp
                .map(|idp| (idp.id, idp.name))
                .unwrap_or_default();
            let service = wire
                .kind
                .as_deref()
                .map(SocialIdpService::from_wire)
                .unwrap_or_else(|| SocialIdpService::Other(String::new()));
            capabilities.push(Capability::SocialIdp(SocialIdp::new(
                id,
                name,
                service,
                remediation.href.clone(),
            )));
        }

        if matches!(
            remediation.kind,
            RemediationKind::ChallengeAuthenticator | RemediationKind::EnrollAuthenticator
        ) {
            if let Some(authenticator) = remediation.authenticator().cloned() {
                capabilities.extend(authenticator_step_capabilities(&remediation, &authenticator));
            }
        }

        for factory in self.factories {
            capabilities.extend(factory.remediation_capabilities(&remediation, &raw));
        }
        remediation.capabilities.extend(capabilities);

        Ok(remediation)
    }

    fn field(&self, wire: IonField, authenticators: &AuthenticatorCollection) -> Field {
        let authenticator = wire
            .relates_to
            .as_ref()
            .and_then(|r| resolve(r, authenticators).into_iter().next());

        let value = if let Some(options) = wire.options {
            let options: Vec<Field> = options
                .into_iter()
                .map(|option| self.field(option, authenticators))
                .collect();
            let selected = wire
                .value
                .as_ref()
                .and_then(|current| options.iter().position(|o| o.value() == Some(current)));
            FieldValue::Choice { options, selected }
        } else if let Some(form) = wire.form {
            FieldValue::Group(self.form(form.value, authenticators))
        } else if let Some(nested) = wire.value.as_ref().and_then(nested_fields) {
            FieldValue::Group(self.form(nested, authenticators))
        } else {
            FieldValue::Scalar(wire.value)
        };

        let mut field = Field::new(wire.name, value)
            .with_required(wire.required.unwrap_or(false))
            .with_visible(wire.visible.unwrap_or(true))
            .with_mutable(wire.mutable.unwrap_or(true))
            .with_secret(wire.secret.unwrap_or(false))
            .with_authenticator(authenticator);
        field.label = wire.label;
        field.kind = wire.kind;
        field.messages = messages(wire.messages).iter().cloned().collect();
        field
    }

    fn form(&self, fields: Vec<IonField>, authenticators: &AuthenticatorCollection) -> Form {
        Form::new(
            fields
                .into_iter()
                .map(|field| self.field(field, authenticators))
                .collect(),
        )
    }
}

/// WebAuthn and Duo capabilities of a challenge or enroll step.
fn authenticator_step_capabilities(
    remediation: &Remediation,
    authenticator: &Authenticator,
) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    let Some(data) = authenticator.contextual_data.as_ref() else {
        return capabilities;
    };

    if authenticator.kind == AuthenticatorKind::SecurityKey {
        if let Some(activation) = data.get("activationData") {
            capabilities.push(Capability::WebAuthnRegistration(WebAuthnRegistration::new(
                remediation.clone(),
                activation.clone(),
            )));
        }
        if let Some(challenge) = data.get("challengeData") {
            capabilities.push(Capability::WebAuthnAuthentication(
                WebAuthnAuthentication::new(remediation.clone(), challenge.clone()),
            ));
        }
    }

    let is_duo = authenticator.key.as_deref() == Some("duo")
        || authenticator.has_method(&AuthenticatorMethod::Duo);
    if is_duo {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(String::from);
        if let (Some(host), Some(signed_token)) = (text("host"), text("signedToken")) {
            capabilities.push(Capability::Duo(Duo::new(
                remediation.clone(),
                host,
                signed_token,
                text("script"),
            )));
        }
    }

    capabilities
}

fn resolve(relates_to: &RelatesTo, authenticators: &AuthenticatorCollection) -> Vec<Arc<Authenticator>> {
    relates_to
        .paths()
        .into_iter()
        .filter_map(|path| {
            let found = authenticators.by_json_path(path).cloned();
            if found.is_none() {
                trace!(path, "Unresolved relatesTo reference");
            }
            found
        })
        .collect()
}

/// Option values of the form `{"form": {"value": [...]}}`.
fn nested_fields(value: &Value) -> Option<Vec<IonField>> {
    let fields = value.get("form")?.get("value")?;
    serde_json::from_value(fields.clone()).ok()
}

fn messages(collection: Option<IonCollection<IonMessage>>) -> MessageCollection {
    MessageCollection::new(
        collection
            .map(|c| c.value)
            .unwrap_or_default()
            .into_iter()
            .map(|m| Message {
                text: m.message,
                localization_key: m.i18n.and_then(|i| i.key),
                severity: m
                    .class
                    .as_deref()
                    .map(MessageSeverity::from_class)
                    .unwrap_or(MessageSeverity::Info),
            })
            .collect(),
    )
}

fn merge_objects(target: &mut Value, overlay: &Value) {
    if let (Value::Object(target), Value::Object(overlay)) = (target, overlay) {
        for (key, value) in overlay {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FlowError, IdxError};
    use crate::parser::ResponseParser;
    use serde_json::json;

    fn parse(document: Value) -> Response {
        ResponseParser::new()
            .parse_value(document, "1.0.0", &ParseContext::default())
            .unwrap()
    }

    #[test]
    fn test_choice_with_nested_option_forms() {
        let response = parse(json!({
            "version": "1.0.0",
            "stateHandle": "02abc",
            "authenticatorEnrollments": { "type": "array", "value": [
                { "id": "aut-email", "type": "email", "displayName": "Email",
                  "methods": [{ "type": "email" }],
                  "profile": { "email": "m***y@example.com" } }
            ]},
            "remediation": { "type": "array", "value": [{
                "rel": ["create-form"],
                "name": "select-authenticator-authenticate",
                "href": "https://example.okta.com/idp/idx/challenge",
                "method": "POST",
                "accepts": "application/json; okta-version=1.0.0",
                "value": [
                    { "name": "authenticator", "type": "object", "options": [{
                        "label": "Email",
                        "value": { "form": { "value": [
                            { "name": "id", "required": true, "value": "aut-email", "mutable": false },
                            { "name": "methodType", "required": false, "value": "email", "mutable": false }
                        ]}},
                        "relatesTo": "$.authenticatorEnrollments.value[0]"
                    }]},
                    { "name": "stateHandle", "required": true, "value": "02abc", "visible": false, "mutable": false }
                ]
            }]}
        }));

        let mut remediation = response
            .remediations
            .get("select-authenticator-authenticate")
            .cloned()
            .unwrap();
        let field = remediation.get("authenticator").unwrap();
        assert_eq!(field.options().len(), 1);
        assert_eq!(
            field.options()[0].authenticator.as_ref().and_then(|a| a.id.as_deref()),
            Some("aut-email")
        );

        remediation
            .get_mut("authenticator")
            .unwrap()
            .select_authenticator("aut-email")
            .unwrap();
        let body: Value = serde_json::from_str(&remediation.request_body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "authenticator": { "id": "aut-email", "methodType": "email" },
                "stateHandle": "02abc"
            })
        );

        let authenticator = response.authenticators.by_id("aut-email").unwrap();
        assert_eq!(
            authenticator.capability::<Profile>().and_then(|p| p.get("email")),
            Some("m***y@example.com")
        );
    }

    #[test]
    fn test_current_enrollment_merges_with_listed_entry() {
        let response = parse(json!({
            "version": "1.0.0",
            "authenticatorEnrollments": { "value": [
                { "id": "aut-email", "type": "email", "methods": [{ "type": "email" }] }
            ]},
            "currentAuthenticatorEnrollment": { "type": "object", "value": {
                "id": "aut-email", "type": "email",
                "resend": {
                    "rel": ["create-form"], "name": "resend",
                    "href": "https://example.okta.com/idp/idx/challenge/resend",
                    "method": "POST",
                    "value": [{ "name": "stateHandle", "value": "02abc", "visible": false, "mutable": false }]
                },
                "poll": {
                    "rel": ["create-form"], "name": "poll",
                    "href": "https://example.okta.com/idp/idx/challenge/poll",
                    "method": "POST", "refresh": 4000,
                    "value": [{ "name": "stateHandle", "value": "02abc", "visible": false, "mutable": false }]
                }
            }}
        }));

        assert_eq!(response.authenticators.len(), 1);
        let current = response.authenticators.current().unwrap();
        assert_eq!(current.state, AuthenticatorState::Authenticating);
        assert!(current.capability::<Resendable>().is_some());
        assert!(current.capability::<Sendable>().is_none());
        assert_eq!(
            current.capability::<Pollable>().map(|p| p.interval()),
            Some(Duration::from_millis(4000))
        );
        assert!(response
            .authenticators
            .by_json_path("$.authenticatorEnrollments.value[0]")
            .is_some());
        assert_eq!(response.pollables().len(), 1);
    }

    #[test]
    fn test_social_idp_capability() {
        let response = parse(json!({
            "version": "1.0.0",
            "remediation": { "value": [{
                "name": "redirect-idp",
                "type": "GOOGLE",
                "idp": { "id": "0oa1", "name": "Google IdP" },
                "href": "https://example.okta.com/oauth2/v1/authorize?client_id=abc",
                "method": "GET"
            }]}
        }));

        let remediation = response.remediations.get("redirect-idp").unwrap();
        let idp = remediation.capability::<SocialIdp>().unwrap();
        assert_eq!(idp.service, SocialIdpService::Google);
        assert_eq!(idp.display_name.as_deref(), Some("Google IdP"));
        assert_eq!(
            idp.redirect_url().as_str(),
            "https://example.okta.com/oauth2/v1/authorize?client_id=abc"
        );
        assert!(remediation.capability::<Pollable>().is_none());
    }

    #[test]
    fn test_webauthn_and_password_capabilities() {
        let response = parse(json!({
            "version": "1.0.0",
            "authenticators": { "value": [
                { "id": "aut-pass", "type": "password", "key": "okta_password",
                  "settings": { "complexity": { "minLength": 8 } } }
            ]},
            "currentAuthenticator": { "value": {
                "id": "aut-key", "type": "security_key",
                "contextualData": { "activationData": { "challenge": "aGVsbG8", "rp": { "name": "Okta" } } }
            }},
            "remediation": { "value": [{
                "name": "enroll-authenticator",
                "relatesTo": ["$.currentAuthenticator"],
                "href": "https://example.okta.com/idp/idx/challenge/answer",
                "value": [{ "name": "credentials", "form": { "value": [
                    { "name": "clientData", "required": true },
                    { "name": "attestation", "required": true }
                ]}}]
            }]}
        }));

        let enroll = response.remediations.get("enroll-authenticator").unwrap();
        let registration = enroll.capability::<WebAuthnRegistration>().unwrap();
        assert_eq!(registration.challenge().unwrap(), b"hello".to_vec());
        assert!(enroll.capability::<WebAuthnAuthentication>().is_none());
        assert_eq!(
            enroll.authenticator().map(|a| a.state),
            Some(AuthenticatorState::Enrolling)
        );

        let password = response
            .authenticators
            .of_kind(&AuthenticatorKind::Password)
            .unwrap();
        assert_eq!(
            password
                .capability::<PasswordSettings>()
                .map(|s| s.complexity.min_length),
            Some(8)
        );
    }

    #[tokio::test]
    async fn test_duo_capability() {
        let response = parse(json!({
            "version": "1.0.0",
            "currentAuthenticatorEnrollment": { "value": {
                "id": "aut-duo", "type": "app", "key": "duo",
                "methods": [{ "type": "duo" }],
                "contextualData": { "host": "api-abc.duosecurity.com", "signedToken": "TX|abc" }
            }},
            "remediation": { "value": [{
                "name": "challenge-authenticator",
                "relatesTo": ["$.currentAuthenticatorEnrollment"],
                "href": "https://example.okta.com/idp/idx/challenge/answer",
                "value": [{ "name": "credentials", "form": { "value": [
                    { "name": "signatureData", "required": true }
                ]}}]
            }]}
        }));

        let challenge = response.remediations.get("challenge-authenticator").unwrap();
        let duo = challenge.capability::<Duo>().unwrap();
        assert_eq!(duo.host, "api-abc.duosecurity.com");
        assert_eq!(duo.signed_token, "TX|abc");
        assert!(duo.script.is_none());

        // parsed without a flow: nothing to submit to
        assert!(matches!(
            duo.answer("AUTH|sig").await,
            Err(IdxError::Flow(FlowError::NotAuthenticating))
        ));
    }

    #[test]
    fn test_invalid_href_is_protocol_error() {
        let result = ResponseParser::new().parse_value(
            json!({
                "version": "1.0.0",
                "remediation": { "value": [{ "name": "identify", "href": "not a url" }] }
            }),
            "1.0.0",
            &ParseContext::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_messages_and_field_messages() {
        let response = parse(json!({
            "version": "1.0.0",
            "messages": { "type": "array", "value": [
                { "message": "Authentication failed", "i18n": { "key": "errors.E0000004" }, "class": "ERROR" }
            ]},
            "remediation": { "value": [{
                "name": "identify",
                "href": "https://example.okta.com/idp/idx/identify",
                "value": [{ "name": "identifier", "messages": { "value": [
                    { "message": "Required", "class": "ERROR" }
                ]}}]
            }]}
        }));

        assert_eq!(
            response.messages.first().and_then(|m| m.localization_key.as_deref()),
            Some("errors.E0000004")
        );
        assert_eq!(response.all_messages().len(), 2);
        assert!(!response.is_login_successful());
    }
}
