//! The local credential vault.
//!
//! [`Vault`] owns two files in the user's private storage: the key file
//! (see [`crate::keyfile`]) and the vault file holding
//! `nonce || ciphertext || tag` of the encoded [`CredentialRecord`].
//!
//! There are no intermediate states: a vault is either empty (no vault file)
//! or holds exactly one sealed secret. Failures are never repaired
//! automatically; a corrupt vault stays on disk until the user replaces it
//! with a fresh `lock`.

use std::path::{Path, PathBuf};

use crate::codec::{self, CredentialRecord};
use crate::crypto;
use crate::error::{Result, VaultError};
use crate::keyfile::{self, FileKeySource, KeySource, WriteMode};

/// Vault file name inside the base directory.
pub const VAULT_FILE_NAME: &str = ".raincheck";

/// Key file name inside the base directory.
pub const KEY_FILE_NAME: &str = ".raincheck_key";

/// Environment variable that relocates both files.
pub const HOME_ENV: &str = "RAINCHECK_HOME";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Locations of the key file and the vault file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub key_file: PathBuf,
    pub vault_file: PathBuf,
}

impl VaultPaths {
    /// Both files directly inside `base`.
    pub fn in_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            key_file: base.join(KEY_FILE_NAME),
            vault_file: base.join(VAULT_FILE_NAME),
        }
    }

    /// `$RAINCHECK_HOME` if set and non-empty, otherwise the home directory.
    pub fn resolve() -> Result<Self> {
        match std::env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::in_dir(PathBuf::from(dir))),
            _ => dirs::home_dir()
                .map(Self::in_dir)
                .ok_or(VaultError::HomeDirUnavailable),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Encrypted single-secret store for the CLI.
///
/// # Example
///
/// ```rust,no_run
/// # fn example() -> raincheck_vault::Result<()> {
/// use raincheck_vault::{Vault, VaultPaths};
///
/// let vault = Vault::new(VaultPaths::resolve()?);
/// vault.lock("abc123")?;
/// assert_eq!(vault.unlock()?, "abc123");
/// # Ok(())
/// # }
/// ```
pub struct Vault {
    vault_file: PathBuf,
    keys: Box<dyn KeySource>,
}

impl Vault {
    /// Open the vault at the given paths with a file-backed key.
    pub fn new(paths: VaultPaths) -> Self {
        Self {
            vault_file: paths.vault_file,
            keys: Box::new(FileKeySource::new(paths.key_file)),
        }
    }

    /// Open the vault file with an arbitrary key source.
    pub fn with_key_source(vault_file: impl Into<PathBuf>, keys: Box<dyn KeySource>) -> Self {
        Self {
            vault_file: vault_file.into(),
            keys,
        }
    }

    pub fn vault_file(&self) -> &Path {
        &self.vault_file
    }

    /// Whether a sealed credential exists on disk. Does not validate it.
    pub fn has_credential(&self) -> bool {
        self.vault_file.exists()
    }

    /// Decrypt and return the stored secret.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] when nothing has been locked yet.
    /// - [`VaultError::CorruptKey`] / [`VaultError::CorruptVault`] for files
    ///   that cannot be parsed.
    /// - [`VaultError::Decryption`] when authentication fails.
    /// - [`VaultError::Decoding`] when the plaintext is not a record.
    pub fn unlock(&self) -> Result<String> {
        let key = self.keys.load_or_create()?;

        let blob = match std::fs::read(&self.vault_file) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound {
                    path: self.vault_file.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let plaintext = crypto::open(&blob, &key)?;
        let record = codec::decode(&plaintext)?;

        tracing::debug!(path = %self.vault_file.display(), "vault unlocked");
        Ok(record.secret().to_owned())
    }

    /// Seal `secret` and atomically replace the vault file.
    pub fn lock(&self, secret: &str) -> Result<()> {
        let key = self.keys.load_or_create()?;

        let payload = zeroize::Zeroizing::new(codec::encode(&CredentialRecord::new(secret))?);
        let blob = crypto::seal(&payload, &key)?;
        keyfile::write_private(&self.vault_file, &blob, WriteMode::Overwrite)?;

        tracing::info!(path = %self.vault_file.display(), "credential stored in vault");
        Ok(())
    }

    /// Remove the vault file. Returns whether a file was removed.
    ///
    /// The key file is left in place so a later `lock` reuses it.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.vault_file) {
            Ok(()) => {
                tracing::info!(path = %self.vault_file.display(), "vault cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("vault_file", &self.vault_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::StaticKeySource;

    fn vault_in(dir: &Path) -> Vault {
        Vault::new(VaultPaths::in_dir(dir))
    }

    #[test]
    fn paths_in_dir_use_fixed_names() {
        let paths = VaultPaths::in_dir("/home/u");
        assert_eq!(paths.key_file, Path::new("/home/u/.raincheck_key"));
        assert_eq!(paths.vault_file, Path::new("/home/u/.raincheck"));
    }

    #[test]
    fn unlock_before_lock_is_not_found_but_creates_key() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_in(dir.path());

        assert!(matches!(vault.unlock(), Err(VaultError::NotFound { .. })));
        assert!(dir.path().join(KEY_FILE_NAME).exists());
        assert!(!vault.has_credential());
    }

    #[test]
    fn lock_overwrites_previous_secret() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_in(dir.path());

        vault.lock("first").unwrap();
        vault.lock("second").unwrap();
        assert_eq!(vault.unlock().unwrap(), "second");
    }

    #[test]
    fn vault_file_never_contains_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_in(dir.path());
        vault.lock("plain-needle-123").unwrap();

        let raw = std::fs::read(vault.vault_file()).unwrap();
        let needle = b"plain-needle-123";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn only_key_and_vault_files_are_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_in(dir.path());
        vault.lock("s").unwrap();
        vault.lock("t").unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![VAULT_FILE_NAME, KEY_FILE_NAME]);
    }

    #[test]
    fn clear_is_idempotent_and_keeps_key() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_in(dir.path());
        vault.lock("s").unwrap();

        assert!(vault.clear().unwrap());
        assert!(!vault.clear().unwrap());
        assert!(dir.path().join(KEY_FILE_NAME).exists());
        assert!(matches!(vault.unlock(), Err(VaultError::NotFound { .. })));
    }

    #[test]
    fn static_key_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vault.bin");
        let vault = Vault::with_key_source(&file, Box::new(StaticKeySource::new(vec![9u8; 32])));

        vault.lock("abc").unwrap();
        assert_eq!(vault.unlock().unwrap(), "abc");
    }

    #[test]
    fn plaintext_that_is_not_a_record_is_decoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vault.bin");
        let key = vec![3u8; 32];
        std::fs::write(&file, crypto::seal(b"[1,2,3]", &key).unwrap()).unwrap();

        let vault = Vault::with_key_source(&file, Box::new(StaticKeySource::new(key)));
        assert!(matches!(vault.unlock(), Err(VaultError::Decoding(_))));
    }
}
