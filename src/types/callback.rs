//! Callback Types
//!
//! Types for handling redirect callbacks (social IDP, email magic links).

use url::Url;

/// Query parameters of a redirect callback.
#[derive(Clone, Debug, Default)]
pub struct CallbackParams {
    /// Interaction code (if the interaction completed at the IDP).
    pub interaction_code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// Error code.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse callback parameters from URL.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "interaction_code" => params.interaction_code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        params
    }

    /// Whether the server asks the client to continue remediation.
    pub fn is_interaction_required(&self) -> bool {
        self.error.as_deref() == Some("interaction_required")
    }
}

/// Classification of a redirect callback against the current interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectResult {
    /// Carries an interaction code for this interaction; exchange it.
    Authenticated,
    /// The server needs more remediation; call `resume`.
    RemediationRequired,
    /// Scheme or path do not match the configured redirect URI.
    InvalidRedirectUrl,
    /// State mismatch, no interaction in progress, or nothing to act on.
    InvalidContext,
}

impl RedirectResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::RemediationRequired => "remediation_required",
            Self::InvalidRedirectUrl => "invalid_redirect_url",
            Self::InvalidContext => "invalid_context",
        }
    }
}
