use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use rand::RngCore;

/// Hash a passphrase with Argon2id, returning the PHC-format string.
pub fn hash_passphrase(passphrase: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| anyhow!("passphrase hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a candidate passphrase against a stored PHC-format hash.
///
/// A hash that fails to parse is a server-side data problem and surfaces as
/// an error; a mismatched passphrase is a plain `false`.
pub fn verify_passphrase(stored_hash: &str, candidate: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| anyhow!("stored hash is invalid: {}", e))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

/// Generate a random passphrase for a provisioned account (hex, 128 bits).
pub fn generate_passphrase() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verify_roundtrip() {
        let hash = hash_passphrase("correct horse battery staple").unwrap();
        assert!(verify_passphrase(&hash, "correct horse battery staple").unwrap());
        assert!(!verify_passphrase(&hash, "incorrect horse").unwrap());
    }

    #[test]
    fn invalid_stored_hash_is_an_error() {
        assert!(verify_passphrase("not-a-phc-string", "whatever").is_err());
    }
}
