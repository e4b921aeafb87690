//! Access token generation.

use std::fmt::Write as _;

use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{StoreError, StoreResult};

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 32;

/// Length of a generated token in characters.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// Produces fresh, unguessable access tokens.
///
/// Stateless apart from the handle to the system CSPRNG.
#[derive(Clone)]
pub struct TokenIssuer {
    rng: SystemRandom,
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Return a new token: [`TOKEN_BYTES`] CSPRNG bytes as lower-case hex.
    ///
    /// There is no fallback source. If the CSPRNG fails the call fails.
    pub fn generate(&self) -> StoreResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| StoreError::Rng)?;
        Ok(to_hex(&bytes))
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

/// Short, non-reversible tag for a token, safe to put in logs.
///
/// First four bytes of the SHA-256 digest as hex.
pub fn fingerprint(token: &str) -> String {
    let digest = digest::digest(&digest::SHA256, token.as_bytes());
    to_hex(&digest.as_ref()[..4])
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tokens_are_64_lowercase_hex_chars() {
        let issuer = TokenIssuer::new();
        for _ in 0..100 {
            let token = issuer.generate().unwrap();
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            );
        }
    }

    #[test]
    fn tokens_do_not_repeat() {
        let issuer = TokenIssuer::new();
        let seen: HashSet<String> = (0..1000).map(|_| issuer.generate().unwrap()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        // sha256("abc") = ba7816bf...
        assert_eq!(fingerprint("abc"), "ba7816bf");
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }

    #[test]
    fn hex_pads_small_bytes() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
    }
}
