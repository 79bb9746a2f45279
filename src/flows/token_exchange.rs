//! Token Exchange
//!
//! `grant_type=interaction_code` requests against the token endpoint, built
//! either from a success remediation or from a redirect's interaction code.

use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, IdxResult, ProtocolError};
use crate::model::{Field, Form, Remediation};
use crate::types::{Context, IdxConfig, Token, TokenResponse};

const GRANT_TYPE: &str = "interaction_code";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fill the client credentials and verifier the server leaves to the client.
///
/// Only unset fields are touched. Without a configured secret the
/// `client_secret` field is dropped from the request.
pub(crate) fn prepare_success_remediation(
    remediation: &Remediation,
    config: &IdxConfig,
    context: &Context,
) -> IdxResult<Remediation> {
    let mut remediation = remediation.clone();

    fill_unset(&mut remediation, "client_id", &config.client_id)?;
    fill_unset(&mut remediation, "code_verifier", context.code_verifier())?;

    match &config.client_secret {
        Some(secret) => fill_unset(&mut remediation, "client_secret", secret.expose_secret())?,
        None => {
            if let Some(field) = remediation.get_mut("client_secret") {
                if !field.has_value() {
                    field.required = false;
                }
            }
        }
    }

    let code = remediation
        .get("interaction_code")
        .and_then(Field::value)
        .and_then(Value::as_str)
        .unwrap_or_default();
    if code.is_empty() {
        return Err(ProtocolError::InternalError {
            message: "success response carries no interaction code".to_string(),
        }
        .into());
    }

    Ok(remediation)
}

/// Synthetic token remediation for an interaction code delivered by redirect.
pub(crate) fn redirect_remediation(
    interaction_code: &str,
    config: &IdxConfig,
    context: &Context,
) -> IdxResult<Remediation> {
    if interaction_code.trim().is_empty() {
        return Err(ProtocolError::InternalError {
            message: "redirect carries an empty interaction code".to_string(),
        }
        .into());
    }

    let endpoints = config
        .endpoints()
        .map_err(|e| ProtocolError::InternalError {
            message: format!("cannot derive token endpoint: {}", e),
        })?;
    let mut fields = vec![
        Field::scalar("grant_type", Some(Value::from(GRANT_TYPE))),
        Field::scalar("interaction_code", Some(Value::from(interaction_code))),
        Field::scalar("client_id", Some(Value::from(config.client_id.as_str()))),
        Field::scalar("code_verifier", Some(Value::from(context.code_verifier()))),
    ];
    if let Some(secret) = &config.client_secret {
        fields.push(Field::scalar(
            "client_secret",
            Some(Value::from(secret.expose_secret().as_str())),
        ));
    }

    let mut remediation =
        Remediation::new("issue", HttpMethod::Post, endpoints.token, Form::new(fields));
    remediation.accepts = Some(FORM_CONTENT_TYPE.to_string());
    Ok(remediation)
}

/// Send a token remediation and read the token response.
pub(crate) async fn exchange<T: HttpTransport + ?Sized>(
    transport: &T,
    config: &IdxConfig,
    remediation: &Remediation,
) -> IdxResult<Token> {
    let body = remediation.request_body()?;

    let mut headers = HashMap::new();
    headers.insert(
        "content-type".to_string(),
        remediation.content_type().to_string(),
    );
    headers.insert("accept".to_string(), "application/json".to_string());

    debug!(url = %remediation.href, "Exchanging interaction code");

    let response = transport
        .send(HttpRequest {
            method: remediation.method,
            url: remediation.href.to_string(),
            headers,
            body: Some(body),
            timeout: Some(config.timeout),
        })
        .await?;

    if !response.is_success() {
        return Err(create_error_from_response(response.status, &response.body));
    }

    let token_response: TokenResponse =
        serde_json::from_str(&response.body).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;

    Ok(Token::from_response(token_response))
}

fn fill_unset(remediation: &mut Remediation, name: &str, value: &str) -> IdxResult<()> {
    if let Some(field) = remediation.get_mut(name) {
        if !field.has_value() {
            field.set_value(value)?;
        }
    }
    Ok(())
}
