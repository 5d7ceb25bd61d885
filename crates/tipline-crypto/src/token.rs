use rand::RngCore;
use sha2::{Digest, Sha256};

/// Mint an opaque API token: 256 random bits, hex-encoded.
///
/// The raw value is returned to the client exactly once; the store keeps only
/// its hash.
pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest under which a token is stored and looked up.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_hex() {
        let a = mint_token();
        let b = mint_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(hex::decode(&a).is_ok());
    }

    #[test]
    fn hash_is_stable_and_token_specific() {
        let token = mint_token();
        assert_eq!(token_hash(&token), token_hash(&token));
        assert_ne!(token_hash(&token), token_hash("somethingelse"));
        assert_eq!(token_hash("x").len(), 64);
    }
}
