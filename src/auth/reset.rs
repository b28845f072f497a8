use rand::RngCore;
use sha2::{Digest, Sha256};

pub const RESET_TOKEN_BYTES: usize = 32;
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Generate the plaintext reset token mailed to the user. Only its digest is
/// ever persisted.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way digest of a reset token, safe to store and compare.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_hex_of_expected_length() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }

    #[test]
    fn digest_is_deterministic() {
        let token = generate_reset_token();
        assert_eq!(hash_reset_token(&token), hash_reset_token(&token));
    }

    #[test]
    fn tampered_token_hashes_differently() {
        let token = generate_reset_token();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('0');
        if tampered != token {
            assert_ne!(hash_reset_token(&token), hash_reset_token(&tampered));
        }
    }
}
