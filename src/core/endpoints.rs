//! IDX Endpoints
//!
//! Endpoint derivation from the configured issuer.

use url::Url;

use crate::error::{ConfigurationError, IdxResult};

/// Resolved endpoints for one issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdxEndpoints {
    /// `/v1/interact` on the authorization server.
    pub interact: Url,
    /// `/idp/idx/introspect` on the org.
    pub introspect: Url,
    /// `/v1/token` on the authorization server.
    pub token: Url,
}

impl IdxEndpoints {
    /// Derive endpoints from an issuer.
    ///
    /// Custom authorization servers (`https://org/oauth2/default`) host the
    /// OAuth2 endpoints under the issuer path; org issuers (`https://org`)
    /// host them under `/oauth2`.
    pub fn from_issuer(issuer: &Url) -> IdxResult<Self> {
        let invalid = || ConfigurationError::InvalidIssuer {
            url: issuer.to_string(),
        };

        if !matches!(issuer.scheme(), "https" | "http") || issuer.host_str().is_none() {
            return Err(invalid().into());
        }

        let path = issuer.path().trim_end_matches('/');
        let oauth_base = if path.contains("/oauth2") {
            path.to_string()
        } else {
            format!("{}/oauth2", path)
        };

        let mut origin = issuer.clone();
        origin.set_query(None);
        origin.set_fragment(None);

        let at = |p: &str| {
            let mut url = origin.clone();
            url.set_path(p);
            url
        };

        Ok(Self {
            interact: at(&format!("{}/v1/interact", oauth_base)),
            introspect: at("/idp/idx/introspect"),
            token: at(&format!("{}/v1/token", oauth_base)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_authorization_server() {
        let issuer = Url::parse("https://example.okta.com/oauth2/default/").unwrap();
        let endpoints = IdxEndpoints::from_issuer(&issuer).unwrap();

        assert_eq!(
            endpoints.interact.as_str(),
            "https://example.okta.com/oauth2/default/v1/interact"
        );
        assert_eq!(
            endpoints.token.as_str(),
            "https://example.okta.com/oauth2/default/v1/token"
        );
        assert_eq!(
            endpoints.introspect.as_str(),
            "https://example.okta.com/idp/idx/introspect"
        );
    }

    #[test]
    fn test_org_authorization_server() {
        let issuer = Url::parse("https://example.okta.com").unwrap();
        let endpoints = IdxEndpoints::from_issuer(&issuer).unwrap();

        assert_eq!(
            endpoints.interact.as_str(),
            "https://example.okta.com/oauth2/v1/interact"
        );
        assert_eq!(
            endpoints.token.as_str(),
            "https://example.okta.com/oauth2/v1/token"
        );
    }

    #[test]
    fn test_rejects_non_http_issuer() {
        let issuer = Url::parse("com.example.app:/callback").unwrap();
        assert!(IdxEndpoints::from_issuer(&issuer).is_err());
    }
}
