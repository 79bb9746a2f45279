//! Sendable, Resendable and Recoverable
//!
//! Authenticator actions that submit a server-provided form: sending or
//! re-sending a code, and starting account recovery.

use crate::error::IdxResult;
use crate::model::{Remediation, Response};

/// Sends a challenge (e.g. an email or SMS code) for the first time.
#[derive(Clone, Debug)]
pub struct Sendable {
    remediation: Remediation,
}

impl Sendable {
    pub fn new(remediation: Remediation) -> Self {
        Self { remediation }
    }

    pub fn remediation(&self) -> &Remediation {
        &self.remediation
    }

    pub async fn send(&self) -> IdxResult<Response> {
        self.remediation.proceed().await
    }
}

/// Sends the challenge again.
#[derive(Clone, Debug)]
pub struct Resendable {
    remediation: Remediation,
}

impl Resendable {
    pub fn new(remediation: Remediation) -> Self {
        Self { remediation }
    }

    pub fn remediation(&self) -> &Remediation {
        &self.remediation
    }

    pub async fn resend(&self) -> IdxResult<Response> {
        self.remediation.proceed().await
    }
}

/// Starts recovery of a forgotten authenticator (usually the password).
#[derive(Clone, Debug)]
pub struct Recoverable {
    remediation: Remediation,
}

impl Recoverable {
    pub fn new(remediation: Remediation) -> Self {
        Self { remediation }
    }

    pub fn remediation(&self) -> &Remediation {
        &self.remediation
    }

    pub async fn recover(&self) -> IdxResult<Response> {
        self.remediation.proceed().await
    }
}
