//! Opaque secrets: refresh tokens, OTPs and generated passwords.

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// `n` random bytes, hex encoded.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

pub fn generate_refresh_token() -> String {
    random_hex(32)
}

/// SHA-256 hex digest; refresh tokens and OTPs are only stored hashed.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A numeric one-time password with exactly `length` digits.
pub fn generate_otp(length: u32) -> String {
    let min = 10u64.pow(length - 1);
    let max = 10u64.pow(length) - 1;
    rand::rng().random_range(min..=max).to_string()
}

/// Ten characters with at least one of each class.
pub fn generate_strong_password() -> String {
    let mut rng = rand::rng();
    let all: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL].concat();

    let mut chars: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL]
        .iter()
        .map(|set| set[rng.random_range(0..set.len())])
        .collect();

    while chars.len() < 10 {
        chars.push(all[rng.random_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    String::from_utf8(chars).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_has_requested_digits() {
        for _ in 0..200 {
            let otp = generate_otp(6);
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(otp.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn strong_password_covers_every_class() {
        for _ in 0..200 {
            let pw = generate_strong_password();
            assert_eq!(pw.len(), 10);
            assert!(pw.bytes().any(|b| UPPER.contains(&b)));
            assert!(pw.bytes().any(|b| LOWER.contains(&b)));
            assert!(pw.bytes().any(|b| DIGITS.contains(&b)));
            assert!(pw.bytes().any(|b| SPECIAL.contains(&b)));
        }
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_eq!(hash_token("abc").len(), 64);
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }
}
