//! Social IDP
//!
//! Redirect to an external identity provider. The caller opens
//! [`SocialIdp::redirect_url`] in a browser and later hands the callback to
//! the flow's redirect handling.

use url::Url;

/// Identity provider service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocialIdpService {
    Google,
    Facebook,
    Apple,
    LinkedIn,
    Microsoft,
    Oidc,
    Saml,
    Other(String),
}

impl SocialIdpService {
    /// Parse the remediation `type` value.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "GOOGLE" => Self::Google,
            "FACEBOOK" => Self::Facebook,
            "APPLE" => Self::Apple,
            "LINKEDIN" => Self::LinkedIn,
            "MICROSOFT" => Self::Microsoft,
            "OIDC" => Self::Oidc,
            "SAML2" => Self::Saml,
            _ => Self::Other(value.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocialIdp {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub service: SocialIdpService,
    redirect_url: Url,
}

impl SocialIdp {
    pub fn new(
        id: Option<String>,
        display_name: Option<String>,
        service: SocialIdpService,
        redirect_url: Url,
    ) -> Self {
        Self {
            id,
            display_name,
            service,
            redirect_url,
        }
    }

    /// URL to open in a browser.
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_from_wire() {
        assert_eq!(SocialIdpService::from_wire("GOOGLE"), SocialIdpService::Google);
        assert_eq!(SocialIdpService::from_wire("saml2"), SocialIdpService::Saml);
        assert_eq!(
            SocialIdpService::from_wire("TWITTER"),
            SocialIdpService::Other("TWITTER".to_string())
        );
    }
}
