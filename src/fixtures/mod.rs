//! Test fixtures for IDX flows.
//!
//! Canned server documents for a login that goes identify → email
//! challenge → success, plus expired and error variants. All fixtures are
//! located in the `fixtures/idx/` subdirectory and are also embedded as
//! constants for use with `MockHttpTransport::queue_body`.

use std::path::PathBuf;

/// `interact` response carrying interaction handle `foo`.
pub const INTERACT: &str = include_str!("idx/interact.json");

/// First step: `identify`, `redirect-idp`, `select-enroll-profile`, `cancel`.
pub const IDENTIFY: &str = include_str!("idx/identify.json");

/// Email challenge with resend and poll on the current enrollment.
pub const CHALLENGE_AUTHENTICATOR: &str = include_str!("idx/challenge_authenticator.json");

/// `successWithInteractionCode` with interaction code `interaction-code-abc`.
pub const SUCCESS: &str = include_str!("idx/success.json");

/// `identify` step whose `expiresAt` lies in the past.
pub const EXPIRED: &str = include_str!("idx/expired.json");

/// Rejected identification, sent with an error status.
pub const ERROR: &str = include_str!("idx/error.json");

/// Token endpoint response.
pub const TOKEN: &str = include_str!("idx/token.json");

/// Get the path to a fixture file.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("fixtures")
        .join(relative_path)
}

/// Load a fixture file as a string.
pub fn load_fixture(relative_path: &str) -> std::io::Result<String> {
    std::fs::read_to_string(fixture_path(relative_path))
}
