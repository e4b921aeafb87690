//! Storage of the 256-bit vault key.
//!
//! The key is generated on first use and kept as 32 raw bytes in a file only
//! the owner can read (mode 0600 on Unix). [`KeySource`] abstracts where the
//! key lives so the vault can be exercised with an injected key in tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::crypto;
use crate::error::{Result, VaultError};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Provides the symmetric key the vault encrypts with.
pub trait KeySource: Send + Sync {
    /// Return the key, creating and persisting one first if none exists.
    fn load_or_create(&self) -> Result<Zeroizing<Vec<u8>>>;

    /// Whether a key has already been created.
    fn has_key(&self) -> bool;
}

// ---------------------------------------------------------------------------
// File-backed key
// ---------------------------------------------------------------------------

/// Raw key bytes in an owner-only file.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    key_file: PathBuf,
}

impl FileKeySource {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.key_file
    }

    fn read_existing(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match std::fs::read(&self.key_file) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                if bytes.len() != crypto::KEY_LEN {
                    return Err(VaultError::CorruptKey {
                        path: self.key_file.clone(),
                        expected: crypto::KEY_LEN,
                        found: bytes.len(),
                    });
                }
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeySource for FileKeySource {
    fn load_or_create(&self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(key) = self.read_existing()? {
            tracing::debug!(path = %self.key_file.display(), "loaded vault key");
            return Ok(key);
        }

        let key = crypto::random_bytes(crypto::KEY_LEN)?;
        match write_private(&self.key_file, &key, WriteMode::CreateNew) {
            Ok(()) => {
                tracing::info!(path = %self.key_file.display(), "generated new vault key");
                Ok(key)
            }
            // Another process created the key between our read and write.
            Err(VaultError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => self
                .read_existing()?
                .ok_or_else(|| VaultError::Io(std::io::ErrorKind::NotFound.into())),
            Err(e) => Err(e),
        }
    }

    fn has_key(&self) -> bool {
        self.key_file.exists()
    }
}

/// A key held in memory. Nothing is written to disk.
pub struct StaticKeySource(Zeroizing<Vec<u8>>);

impl StaticKeySource {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(key.into()))
    }
}

impl KeySource for StaticKeySource {
    fn load_or_create(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.0.clone())
    }

    fn has_key(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Private file writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Replace any existing file.
    Overwrite,
    /// Fail with `AlreadyExists` if the target exists.
    CreateNew,
}

/// Write `bytes` to `path` through a temp file in the same directory, so the
/// target is either the old content or the complete new content.
///
/// The temp file is created owner-only before any byte is written.
pub(crate) fn write_private(path: &Path, bytes: &[u8], mode: WriteMode) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".raincheck-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o600));
    }
    let mut tmp = builder.tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    match mode {
        WriteMode::Overwrite => tmp.persist(path).map_err(|e| e.error)?,
        WriteMode::CreateNew => tmp.persist_noclobber(path).map_err(|e| e.error)?,
    };

    Ok(())
}
