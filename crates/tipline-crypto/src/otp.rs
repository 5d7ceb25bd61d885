use anyhow::{Result, anyhow};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 6238 time step.
pub const TOTP_PERIOD_SECS: i64 = 30;
/// Codes are six decimal digits.
pub const TOTP_DIGITS: u32 = 6;
/// Accept one step of clock skew on either side.
const TOTP_SKEW_STEPS: i64 = 1;

/// Generate a fresh 160-bit TOTP secret, hex-encoded for storage.
pub fn generate_otp_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The code a correct authenticator shows for `secret_hex` at `unix_time`.
pub fn totp_at(secret_hex: &str, unix_time: i64) -> Result<String> {
    let secret =
        hex::decode(secret_hex).map_err(|e| anyhow!("otp secret is not valid hex: {}", e))?;
    let counter = (unix_time / TOTP_PERIOD_SECS) as u64;
    let code = hotp(&secret, counter)?;
    Ok(format!("{:01$}", code, TOTP_DIGITS as usize))
}

/// Check a candidate code at `unix_time`, allowing ±1 period of skew.
pub fn verify_totp(secret_hex: &str, candidate: &str, unix_time: i64) -> Result<bool> {
    for step in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
        let t = unix_time + step * TOTP_PERIOD_SECS;
        if totp_at(secret_hex, t)? == candidate {
            return Ok(true);
        }
    }
    Ok(false)
}

/// RFC 4226 HOTP with SHA-1 and dynamic truncation.
fn hotp(secret: &[u8], counter: u64) -> Result<u32> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| anyhow!("otp secret rejected by hmac: {}", e))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Ok(bin % 10u32.pow(TOTP_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B vectors (SHA-1 secret "12345678901234567890"),
    // truncated to six digits.
    const RFC_SECRET_HEX: &str = "3132333435363738393031323334353637383930";

    #[test]
    fn rfc6238_vectors() {
        let cases = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
        ];
        for (time, expected) in cases {
            assert_eq!(totp_at(RFC_SECRET_HEX, time).unwrap(), expected, "T={}", time);
        }
    }

    #[test]
    fn verify_accepts_adjacent_periods() {
        let code = totp_at(RFC_SECRET_HEX, 59).unwrap();
        // Same period, one period later, one earlier.
        assert!(verify_totp(RFC_SECRET_HEX, &code, 59).unwrap());
        assert!(verify_totp(RFC_SECRET_HEX, &code, 59 + TOTP_PERIOD_SECS).unwrap());
        assert!(verify_totp(RFC_SECRET_HEX, &code, 59 - TOTP_PERIOD_SECS).unwrap());
        // Two periods away is out of the window.
        assert!(!verify_totp(RFC_SECRET_HEX, &code, 59 + 2 * TOTP_PERIOD_SECS).unwrap());
    }

    #[test]
    fn garbage_code_is_rejected() {
        assert!(!verify_totp(RFC_SECRET_HEX, "000000", 59).unwrap());
        assert!(verify_totp("zz-not-hex", "123456", 59).is_err());
    }

    #[test]
    fn generated_secrets_are_distinct_hex() {
        let a = generate_otp_secret();
        let b = generate_otp_secret();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
        assert!(hex::decode(&a).is_ok());
    }
}
