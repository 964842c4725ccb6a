//! Cryptographic helpers.
//!
//! - PBKDF2-SHA256 password hashing
//! - Opaque random tokens, stored as SHA-256 digests
//! - `SecretBox`: ChaCha20-Poly1305 sealing of small secrets at rest

use crate::error::{AppError, AppResult};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};

#[cfg(not(test))]
const PBKDF2_ITERATIONS: u32 = 600_000;
#[cfg(test)]
const PBKDF2_ITERATIONS: u32 = 1_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TOKEN_LEN: usize = 32;

/// Join code alphabet without look-alikes (0/O, 1/I/L)
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const JOIN_CODE_LEN: usize = 8;

fn random_bytes<const N: usize>() -> AppResult<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AppError::Message(format!("RNG failure: {}", e)))?;
    Ok(buf)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Passwords ───────────────────────────────────────────────────────────────

/// Hash a password with PBKDF2-SHA256. Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> AppResult<(String, String)> {
    let salt = random_bytes::<SALT_LEN>()?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);
    Ok((hex::encode(hash), hex::encode(salt)))
}

/// Verify a password against a stored hash and salt (both hex-encoded).
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);
    constant_time_eq(&hash, &expected)
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// Generate a secure random token (sessions, invitations). Returns hex.
pub fn generate_token() -> AppResult<String> {
    Ok(hex::encode(random_bytes::<TOKEN_LEN>()?))
}

/// Hash a token with SHA-256 for storage. Returns hex.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

/// Random human-friendly room join code
pub fn generate_join_code() -> AppResult<String> {
    let bytes = random_bytes::<JOIN_CODE_LEN>()?;
    Ok(bytes
        .iter()
        .map(|b| JOIN_CODE_ALPHABET[*b as usize % JOIN_CODE_ALPHABET.len()] as char)
        .collect())
}

/// Canonical form of a user-typed join code (case and dashes ignored)
pub fn normalize_join_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

// ── Sealing ─────────────────────────────────────────────────────────────────

/// Authenticated symmetric encryption for secrets kept in the database
#[derive(Clone)]
pub struct SecretBox {
    cipher: ChaCha20Poly1305,
}

impl SecretBox {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Encrypt `plaintext`; output is `hex(nonce || ciphertext)`
    pub fn seal(&self, plaintext: &str) -> AppResult<String> {
        let nonce_bytes = random_bytes::<NONCE_LEN>()?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| AppError::Message("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Decrypt a value produced by [`SecretBox::seal`]; fails on tampering
    pub fn open(&self, sealed: &str) -> AppResult<String> {
        let raw = hex::decode(sealed)
            .map_err(|_| AppError::Message("sealed value is not hex".to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(AppError::Message("sealed value is too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Message("sealed value failed authentication".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::Message("sealed value is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let (hash, salt) = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash, &salt));
        assert!(!verify_password("wrong horse", &hash, &salt));
        assert!(!verify_password("correct horse", "not-hex", &salt));
    }

    #[test]
    fn test_salts_differ() {
        let (h1, s1) = hash_password("pw-pw-pw-pw").unwrap();
        let (h2, s2) = hash_password("pw-pw-pw-pw").unwrap();
        assert_ne!(s1, s2);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_tokens_are_random_and_hash_stably() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), TOKEN_LEN * 2);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&format!(" {} ", a)));
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn test_join_code_shape() {
        let code = generate_join_code().unwrap();
        assert_eq!(code.len(), JOIN_CODE_LEN);
        assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        assert_eq!(normalize_join_code("abcd-efgh"), "ABCDEFGH");
    }

    #[test]
    fn test_seal_and_open() {
        let sb = SecretBox::new(&[7u8; 32]);
        let sealed = sb.seal("K7PQ2MXR").unwrap();
        assert_ne!(sealed, "K7PQ2MXR");
        assert_eq!(sb.open(&sealed).unwrap(), "K7PQ2MXR");
        // fresh nonce each time
        assert_ne!(sb.seal("K7PQ2MXR").unwrap(), sealed);
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let sb = SecretBox::new(&[7u8; 32]);
        let sealed = sb.seal("secret").unwrap();
        let mut raw = hex::decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(sb.open(&hex::encode(raw)).is_err());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let sealed = SecretBox::new(&[1u8; 32]).seal("secret").unwrap();
        assert!(SecretBox::new(&[2u8; 32]).open(&sealed).is_err());
        assert!(SecretBox::new(&[2u8; 32]).open("abcd").is_err());
    }
}
