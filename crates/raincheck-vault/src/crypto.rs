//! AES-256-GCM through `ring`.
//!
//! A sealed blob is laid out as
//!
//! ```text
//! nonce (12) | ciphertext (len of plaintext) | tag (16)
//! ```
//!
//! Every [`seal`] draws a fresh random nonce. Keys are used through
//! `LessSafeKey` because each blob carries its own nonce; nothing here ever
//! seals twice with the same one.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const KEY_LEN: usize = 32;

/// Nonce prefix length of a sealed blob.
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// GCM tag suffix length of a sealed blob.
pub const TAG_LEN: usize = 16;

fn aead_key(key: &[u8]) -> Option<LessSafeKey> {
    if key.len() != KEY_LEN {
        return None;
    }
    UnboundKey::new(&AES_256_GCM, key).ok().map(LessSafeKey::new)
}

/// Encrypt `plaintext` under the 32-byte `key`.
///
/// Fails with [`VaultError::Encryption`] on a key of the wrong size and with
/// [`VaultError::Rng`] when no nonce can be drawn.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let key = aead_key(key).ok_or_else(|| VaultError::Encryption {
        reason: format!("expected a {KEY_LEN}-byte key, got {} bytes", key.len()),
    })?;

    let mut blob = vec![0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut blob)
        .map_err(|_| VaultError::Rng)?;
    let nonce = Nonce::try_assume_unique_for_key(&blob).map_err(|_| VaultError::Rng)?;

    blob.reserve(plaintext.len() + TAG_LEN);
    blob.extend_from_slice(plaintext);
    let tag = key
        .seal_in_place_separate_tag(nonce, Aad::empty(), &mut blob[NONCE_LEN_BYTES..])
        .map_err(|_| VaultError::Encryption {
            reason: "AES-256-GCM seal rejected the input".into(),
        })?;
    blob.extend_from_slice(tag.as_ref());

    tracing::trace!(bytes = blob.len(), "payload sealed");
    Ok(blob)
}

/// Authenticate and decrypt a blob produced by [`seal`].
///
/// A blob too short to hold a nonce is [`VaultError::CorruptVault`]. Any
/// other failure, whether wrong key, flipped bit or cut-off tag, is
/// [`VaultError::Decryption`].
pub fn open(blob: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let Some((nonce, sealed)) = blob.split_at_checked(NONCE_LEN_BYTES) else {
        return Err(VaultError::CorruptVault {
            reason: format!(
                "{} bytes cannot hold the {NONCE_LEN_BYTES}-byte nonce",
                blob.len()
            ),
        });
    };

    let key = aead_key(key).ok_or(VaultError::Decryption)?;
    let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| VaultError::Decryption)?;

    let mut buf = Zeroizing::new(sealed.to_vec());
    let len = key
        .open_in_place(nonce, Aad::empty(), &mut buf)
        .map_err(|_| VaultError::Decryption)?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// The nonce prefix of `blob`, if it has one.
pub fn nonce_of(blob: &[u8]) -> Option<&[u8]> {
    blob.get(..NONCE_LEN_BYTES)
}

/// `len` bytes from the system CSPRNG, wiped on drop.
pub fn random_bytes(len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(vec![0u8; len]);
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Rng)?;
    Ok(buf)
}
