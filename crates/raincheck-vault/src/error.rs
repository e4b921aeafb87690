//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. The variants are
//! split so the CLI can tell "nothing stored yet" apart from "stored but
//! unreadable" apart from "wrong local key" without looking at message text.

use std::path::PathBuf;

/// Unified error type for the local credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Absence ------------------------------------------------------------
    /// No vault file exists yet.
    #[error("no credential stored at {}", path.display())]
    NotFound { path: PathBuf },

    // -- Integrity ----------------------------------------------------------
    /// The vault file is too short to contain a nonce.
    #[error("vault file is corrupt: {reason}")]
    CorruptVault { reason: String },

    /// The key file exists but does not hold a 256-bit key.
    #[error("key file {} is corrupt: expected {expected} bytes, found {found}", path.display())]
    CorruptKey {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Authenticated decryption failed. Wrong key, tampered file and
    /// truncated ciphertext all land here.
    #[error("decryption failed: wrong key or corrupted data")]
    Decryption,

    /// Sealing failed inside `ring`.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    // -- Codec --------------------------------------------------------------
    /// The credential record could not be serialized.
    #[error("failed to encode credential record: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The decrypted payload is not a valid credential record.
    #[error("failed to decode credential record: {0}")]
    Decoding(#[source] serde_json::Error),

    // -- Environment --------------------------------------------------------
    /// The system CSPRNG failed.
    #[error("random number generator failure")]
    Rng,

    /// No home directory could be resolved for the default file locations.
    #[error("could not determine the home directory")]
    HomeDirUnavailable,

    /// I/O error while reading or writing the key or vault file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Whether this error means the local data is present but unusable.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::CorruptVault { .. } | Self::CorruptKey { .. } | Self::Decryption | Self::Decoding(_)
        )
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
