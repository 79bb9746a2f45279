//! State Nonce
//!
//! Generation and comparison of the `state` parameter bound to an interaction.

use base64::Engine;
use constant_time_eq::constant_time_eq;
use rand::Rng;

/// Generate a random state nonce (32 bytes, base64url).
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare a received state with the expected one in constant time.
pub fn state_matches(expected: &str, received: &str) -> bool {
    constant_time_eq(expected.as_bytes(), received.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state_is_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_state_matches() {
        assert!(state_matches("state", "state"));
        assert!(!state_matches("state", "other"));
        assert!(!state_matches("state", "state2"));
        assert!(!state_matches("state", ""));
        assert!(!state_matches("", "state"));
    }
}
