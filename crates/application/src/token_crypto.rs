//! Opaque invitation tokens.
//!
//! Raw tokens are 32 random bytes hex encoded; only their SHA-256 hash is stored.

use std::fmt::Write;

use sha2::{Digest, Sha256};
use warden_core::{AppError, AppResult};

use crate::TokenGenerator;

/// Token generator backed by the operating system's random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> AppResult<String> {
        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).map_err(|error| {
            AppError::Internal(format!("failed to generate invitation token: {error}"))
        })?;

        Ok(to_hex(&bytes))
    }
}

/// Computes the SHA-256 hash of a token string for storage.
#[must_use]
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::{RandomTokenGenerator, hash_token};
    use crate::TokenGenerator;

    #[test]
    fn generated_tokens_are_hex_and_unique() {
        let generator = RandomTokenGenerator;
        let first = generator.generate().unwrap_or_else(|_| unreachable!());
        let second = generator.generate().unwrap_or_else(|_| unreachable!());

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|character| character.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
