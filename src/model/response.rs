//! IDX Response
//!
//! The document returned at every step of an interaction.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::capability::Pollable;
use crate::model::{
    AuthenticatorCollection, Message, MessageCollection, Remediation, RemediationCollection,
};

/// What the interaction is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    EnrollNewUser,
    LoginOrEnroll,
    Login,
    CredentialEnroll,
    CredentialUnenroll,
    CredentialRecovery,
    CredentialModify,
    Unknown(String),
}

impl Intent {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ENROLL_NEW_USER" => Self::EnrollNewUser,
            "LOGIN_OR_ENROLL" => Self::LoginOrEnroll,
            "LOGIN" => Self::Login,
            "CREDENTIAL_ENROLLMENT" => Self::CredentialEnroll,
            "CREDENTIAL_UNENROLLMENT" => Self::CredentialUnenroll,
            "CREDENTIAL_RECOVERY" => Self::CredentialRecovery,
            "CREDENTIAL_MODIFY" => Self::CredentialModify,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The user the interaction identified.
#[derive(Clone, Debug, Default)]
pub struct User {
    pub id: Option<String>,
    pub identifier: Option<String>,
    pub profile: BTreeMap<String, Value>,
}

/// The application the interaction authenticates into.
#[derive(Clone, Debug, Default)]
pub struct App {
    pub id: Option<String>,
    pub label: Option<String>,
    pub name: Option<String>,
}

/// Parsed response.
///
/// Structure is fixed once parsed; only field values change, through
/// [`Remediation::set_value`](crate::model::Remediation::set_value).
#[derive(Clone, Debug)]
pub struct Response {
    pub version: String,
    pub state_handle: Option<String>,
    pub intent: Option<Intent>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Available next steps, including `cancel` and the success
    /// remediation when present.
    pub remediations: RemediationCollection,
    pub authenticators: AuthenticatorCollection,
    pub messages: MessageCollection,
    pub user: Option<User>,
    pub app: Option<App>,
    pub(crate) cancel_remediation: Option<Remediation>,
    pub(crate) success_remediation: Option<Remediation>,
    pub(crate) generation: u64,
}

impl Response {
    /// Whether the interaction finished and a code can be exchanged.
    pub fn is_login_successful(&self) -> bool {
        self.success_remediation.is_some()
    }

    pub fn cancel_remediation(&self) -> Option<&Remediation> {
        self.cancel_remediation.as_ref()
    }

    pub fn success_remediation(&self) -> Option<&Remediation> {
        self.success_remediation.as_ref()
    }

    /// Generation of the flow step that produced this response.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }

    /// Time left before the response expires; zero when already expired.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Response messages followed by field messages of every remediation.
    pub fn all_messages(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.messages.iter().collect();
        for remediation in self.remediations.iter() {
            messages.extend(remediation.form.messages());
        }
        messages
    }

    /// Every pollable capability on remediations and authenticators.
    pub fn pollables(&self) -> Vec<&Pollable> {
        let from_remediations = self
            .remediations
            .iter()
            .filter_map(|r| r.capability::<Pollable>());
        let from_authenticators = self
            .authenticators
            .iter()
            .filter_map(|a| a.capability::<Pollable>());
        from_remediations.chain(from_authenticators).collect()
    }

    /// Stop every poll this response started.
    pub fn stop_polling(&self) {
        for pollable in self.pollables() {
            pollable.stop_polling();
        }
    }
}
