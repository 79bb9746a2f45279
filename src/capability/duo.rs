//! Duo
//!
//! Data for the embedded Duo widget and submission of its signed answer.

use crate::error::IdxResult;
use crate::model::{Remediation, Response};

#[derive(Clone, Debug)]
pub struct Duo {
    remediation: Remediation,
    pub host: String,
    pub signed_token: String,
    pub script: Option<String>,
}

impl Duo {
    pub fn new(
        remediation: Remediation,
        host: String,
        signed_token: String,
        script: Option<String>,
    ) -> Self {
        Self {
            remediation,
            host,
            signed_token,
            script,
        }
    }

    /// Submit the signature returned by the Duo widget.
    pub async fn answer(&self, signature_data: &str) -> IdxResult<Response> {
        let mut remediation = self.remediation.clone();
        remediation.set_value("credentials.signatureData", signature_data)?;
        remediation.proceed().await
    }
}
