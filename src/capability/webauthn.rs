//! WebAuthn
//!
//! Registration and authentication steps for security key authenticators.
//! The platform authenticator produces the raw bytes; these capabilities
//! carry the server challenge to it and submit its output.

use base64::Engine;
use serde_json::Value;

use crate::error::{IdxResult, ProtocolError};
use crate::model::{Remediation, Response};

fn decode_challenge(data: &Value) -> IdxResult<Vec<u8>> {
    let challenge = data
        .get("challenge")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::InvalidResponseData {
            message: "WebAuthn challenge missing".to_string(),
        })?;

    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(challenge.trim_end_matches('='))
        .map_err(|e| {
            ProtocolError::InvalidResponseData {
                message: format!("WebAuthn challenge is not base64url: {}", e),
            }
            .into()
        })
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Enrollment of a new security key.
#[derive(Clone, Debug)]
pub struct WebAuthnRegistration {
    remediation: Remediation,
    activation_data: Value,
}

impl WebAuthnRegistration {
    pub fn new(remediation: Remediation, activation_data: Value) -> Self {
        Self {
            remediation,
            activation_data,
        }
    }

    /// Credential creation options as sent by the server.
    pub fn activation_data(&self) -> &Value {
        &self.activation_data
    }

    pub fn challenge(&self) -> IdxResult<Vec<u8>> {
        decode_challenge(&self.activation_data)
    }

    pub fn relying_party_name(&self) -> Option<&str> {
        self.activation_data
            .pointer("/rp/name")
            .and_then(Value::as_str)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.activation_data
            .pointer("/user/name")
            .and_then(Value::as_str)
    }

    /// Submit the attestation produced by the platform authenticator.
    pub async fn register(
        &self,
        client_data_json: &[u8],
        attestation_object: &[u8],
    ) -> IdxResult<Response> {
        let mut remediation = self.remediation.clone();
        remediation.set_value("credentials.clientData", encode(client_data_json))?;
        remediation.set_value("credentials.attestation", encode(attestation_object))?;
        remediation.proceed().await
    }
}

/// Verification with an enrolled security key.
#[derive(Clone, Debug)]
pub struct WebAuthnAuthentication {
    remediation: Remediation,
    challenge_data: Value,
}

impl WebAuthnAuthentication {
    pub fn new(remediation: Remediation, challenge_data: Value) -> Self {
        Self {
            remediation,
            challenge_data,
        }
    }

    /// Credential request options as sent by the server.
    pub fn challenge_data(&self) -> &Value {
        &self.challenge_data
    }

    pub fn challenge(&self) -> IdxResult<Vec<u8>> {
        decode_challenge(&self.challenge_data)
    }

    pub fn user_verification(&self) -> Option<&str> {
        self.challenge_data
            .get("userVerification")
            .and_then(Value::as_str)
    }

    /// Submit the assertion produced by the platform authenticator.
    pub async fn authenticate(
        &self,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
    ) -> IdxResult<Response> {
        let mut remediation = self.remediation.clone();
        remediation.set_value("credentials.clientData", encode(client_data_json))?;
        remediation.set_value("credentials.authenticatorData", encode(authenticator_data))?;
        remediation.set_value("credentials.signatureData", encode(signature))?;
        remediation.proceed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpMethod;
    use crate::model::{Field, Form};
    use serde_json::json;
    use url::Url;

    fn remediation() -> Remediation {
        Remediation::new(
            "challenge-authenticator",
            HttpMethod::Post,
            Url::parse("https://example.okta.com/idp/idx/challenge/answer").unwrap(),
            Form::new(vec![Field::group(
                "credentials",
                Form::new(vec![
                    Field::scalar("clientData", None).with_required(true),
                    Field::scalar("authenticatorData", None).with_required(true),
                    Field::scalar("signatureData", None).with_required(true),
                ]),
            )]),
        )
    }

    #[test]
    fn test_challenge_decoding() {
        let capability = WebAuthnAuthentication::new(
            remediation(),
            json!({ "challenge": "aGVsbG8", "userVerification": "preferred" }),
        );

        assert_eq!(capability.challenge().unwrap(), b"hello".to_vec());
        assert_eq!(capability.user_verification(), Some("preferred"));
    }

    #[test]
    fn test_missing_challenge() {
        let capability = WebAuthnRegistration::new(remediation(), json!({ "rp": { "name": "Okta" } }));
        assert!(capability.challenge().is_err());
        assert_eq!(capability.relying_party_name(), Some("Okta"));
    }

    #[tokio::test]
    async fn test_registration_needs_matching_form() {
        // the challenge form has no attestation field
        let capability = WebAuthnRegistration::new(remediation(), json!({}));
        assert!(capability.register(b"{}", b"att").await.is_err());
    }
}
