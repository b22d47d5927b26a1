use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

pub const OTP_LENGTH: usize = 6;
const RESET_TOKEN_BYTES: usize = 32;

/// Random 6-digit numeric code, zero-padded.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

/// Opaque reset token: 32 random bytes, hex-encoded. Only its hash is
/// persisted; the plaintext travels once inside the emailed link.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// One-way digest used for both OTP codes and reset tokens before storage.
pub fn hash_token(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn otp_is_six_ascii_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn otp_values_vary() {
        let codes: HashSet<String> = (0..100).map(|_| generate_otp()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn reset_token_is_64_hex_chars_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic_and_not_the_plaintext() {
        let code = "123456";
        let hash = hash_token(code);
        assert_eq!(hash, hash_token(code));
        assert_ne!(hash, code);
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn different_inputs_hash_differently() {
        assert_ne!(hash_token("123456"), hash_token("123457"));
    }
}
