use rand::Rng;
use sha2::{Digest, Sha256};

// One-time token lifetimes
pub const VERIFICATION_TOKEN_EXPIRY_HOURS: i64 = 24;
pub const RESET_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Generate a random one-time token (64 hex characters). Used for email
/// verification and password resets; the raw value goes out in the
/// notification intent, only its hash is stored.
pub fn generate_one_time_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Hash a one-time token for storage, so a leaked database row cannot be
/// replayed as a live token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_one_time_token_length() {
        let token = generate_one_time_token();
        assert_eq!(token.len(), 64, "Token should be 64 hex characters");
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_one_time_token_uniqueness() {
        assert_ne!(
            generate_one_time_token(),
            generate_one_time_token(),
            "Tokens should be unique"
        );
    }

    #[test]
    fn test_hash_token_deterministic() {
        assert_eq!(hash_token("token_abc"), hash_token("token_abc"));
    }

    #[test]
    fn test_hash_token_different_inputs() {
        assert_ne!(hash_token("token1"), hash_token("token2"));
    }
}
