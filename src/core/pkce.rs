//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange material for the interact request.

use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use crate::error::{ConfigurationError, IdxResult, ProtocolError};

/// PKCE challenge method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PkceMethod {
    /// SHA-256 hash (the only method IDX accepts).
    #[default]
    S256,
    /// Plain text.
    Plain,
}

impl PkceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

/// PKCE parameters.
#[derive(Clone)]
pub struct PkceParams {
    /// Code verifier (keep secret).
    pub code_verifier: String,
    /// Code challenge (sent with the interact request).
    pub code_challenge: String,
    /// Challenge method used.
    pub code_challenge_method: PkceMethod,
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("code_challenge_method", &self.code_challenge_method)
            .finish()
    }
}

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    /// Generate PKCE parameters.
    fn generate(&self, method: PkceMethod) -> IdxResult<PkceParams>;
}

/// Compute challenge from verifier.
pub fn compute_challenge(verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::Plain => verifier.to_string(),
        PkceMethod::S256 => {
            // S256: BASE64URL(SHA256(code_verifier))
            let hash = Sha256::digest(verifier.as_bytes());
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
        }
    }
}

/// Default PKCE generator backed by the system CSPRNG.
pub struct DefaultPkceGenerator {
    verifier_length: usize,
    rng: SystemRandom,
}

impl DefaultPkceGenerator {
    /// Create new PKCE generator with the default verifier length (43).
    pub fn new() -> Self {
        Self {
            verifier_length: 43,
            rng: SystemRandom::new(),
        }
    }

    /// Create PKCE generator with custom verifier length (43..=128).
    pub fn with_length(length: usize) -> IdxResult<Self> {
        if !(43..=128).contains(&length) {
            return Err(ConfigurationError::InvalidConfig {
                message: "PKCE verifier length must be between 43 and 128".to_string(),
            }
            .into());
        }
        Ok(Self {
            verifier_length: length,
            rng: SystemRandom::new(),
        })
    }

    fn generate_verifier(&self) -> IdxResult<String> {
        let mut random_bytes = vec![0u8; (self.verifier_length * 3 + 3) / 4];
        self.rng.fill(&mut random_bytes).map_err(|_| {
            ProtocolError::CannotCreateRequest {
                message: "secure random source unavailable for PKCE verifier".to_string(),
            }
        })?;

        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&random_bytes);
        Ok(encoded[..self.verifier_length].to_string())
    }
}

impl Default for DefaultPkceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self, method: PkceMethod) -> IdxResult<PkceParams> {
        let code_verifier = self.generate_verifier()?;
        let code_challenge = compute_challenge(&code_verifier, method);

        Ok(PkceParams {
            code_verifier,
            code_challenge,
            code_challenge_method: method,
        })
    }
}

/// Mock PKCE generator for testing.
#[derive(Default)]
pub struct MockPkceGenerator {
    next_verifier: Mutex<Option<String>>,
    fail: Mutex<bool>,
    generate_count: Mutex<usize>,
}

impl MockPkceGenerator {
    /// Create new mock PKCE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always hand out the given verifier.
    pub fn with_verifier(verifier: impl Into<String>) -> Self {
        let generator = Self::default();
        generator.set_next_verifier(verifier);
        generator
    }

    /// Set the verifier to generate.
    pub fn set_next_verifier(&self, verifier: impl Into<String>) -> &Self {
        if let Ok(mut next) = self.next_verifier.lock() {
            *next = Some(verifier.into());
        }
        self
    }

    /// Make subsequent generation attempts fail.
    pub fn set_failing(&self, fail: bool) -> &Self {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
        self
    }

    /// Number of generate calls.
    pub fn generate_count(&self) -> usize {
        self.generate_count.lock().map(|c| *c).unwrap_or(0)
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self, method: PkceMethod) -> IdxResult<PkceParams> {
        if let Ok(mut count) = self.generate_count.lock() {
            *count += 1;
        }

        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(ProtocolError::CannotCreateRequest {
                message: "mock PKCE failure".to_string(),
            }
            .into());
        }

        let code_verifier = self
            .next_verifier
            .lock()
            .ok()
            .and_then(|v| v.clone())
            .unwrap_or_else(|| format!("mock-verifier-{}", rand::random::<u32>()));

        Ok(PkceParams {
            code_challenge: compute_challenge(&code_verifier, method),
            code_verifier,
            code_challenge_method: method,
        })
    }
}

/// Validate PKCE verifier format.
pub fn is_valid_verifier(verifier: &str) -> bool {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return false;
    }

    verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_generation() {
        let generator = DefaultPkceGenerator::new();
        let params = generator.generate(PkceMethod::S256).unwrap();

        assert_eq!(params.code_verifier.len(), 43);
        assert!(is_valid_verifier(&params.code_verifier));
        assert_eq!(params.code_challenge.len(), 43);
        assert_eq!(params.code_challenge_method, PkceMethod::S256);
    }

    #[test]
    fn test_pkce_s256_challenge() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_challenge(verifier, PkceMethod::S256),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verifier_length_bounds() {
        assert!(DefaultPkceGenerator::with_length(42).is_err());
        assert!(DefaultPkceGenerator::with_length(129).is_err());
        let generator = DefaultPkceGenerator::with_length(128).unwrap();
        assert_eq!(
            generator.generate(PkceMethod::S256).unwrap().code_verifier.len(),
            128
        );
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let params = MockPkceGenerator::with_verifier("bar")
            .generate(PkceMethod::S256)
            .unwrap();
        let debug = format!("{:?}", params);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("\"bar\""));
    }

    #[test]
    fn test_mock_generator_failure() {
        let generator = MockPkceGenerator::new();
        generator.set_failing(true);
        let result = generator.generate(PkceMethod::S256);
        assert!(matches!(
            result,
            Err(crate::error::IdxError::Protocol(
                ProtocolError::CannotCreateRequest { .. }
            ))
        ));
        assert_eq!(generator.generate_count(), 1);
    }
}
