//! Encrypted local credential vault for the raincheck CLI.
//!
//! The CLI keeps exactly one secret, the user's API key, on the workstation.
//! It is sealed with AES-256-GCM under a 256-bit key that is generated on
//! first use and stored next to the vault in an owner-only file.
//!
//! # Modules
//!
//! - [`codec`]: encoding of the credential record.
//! - [`crypto`]: AES-256-GCM seal/open and random bytes.
//! - [`keyfile`]: key generation and persistence.
//! - [`vault`]: the `lock` / `unlock` lifecycle.
//! - [`error`]: unified error type.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod keyfile;
pub mod vault;

pub use codec::CredentialRecord;
pub use error::{Result, VaultError};
pub use keyfile::{FileKeySource, KeySource, StaticKeySource};
pub use vault::{Vault, VaultPaths};
