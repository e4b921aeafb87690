//! Encoding of the credential record that sits inside the vault.
//!
//! The record is compact JSON, `{"api_key":"..."}`. Decoding is strict so a
//! payload that authenticates but does not parse is reported as
//! [`VaultError::Decoding`] rather than as a decryption failure.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// The single secret the vault protects.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(deny_unknown_fields)]
pub struct CredentialRecord {
    #[serde(rename = "api_key")]
    secret: String,
}

impl CredentialRecord {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Serialize a record to bytes.
pub fn encode(record: &CredentialRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(VaultError::Encoding)
}

/// Parse bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<CredentialRecord> {
    serde_json::from_slice(bytes).map_err(VaultError::Decoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        let record = CredentialRecord::new("abc123");
        assert_eq!(encode(&record).unwrap(), encode(&record).unwrap());
        assert_eq!(encode(&record).unwrap(), br#"{"api_key":"abc123"}"#);
    }

    #[test]
    fn decode_reads_encoded_record() {
        let bytes = encode(&CredentialRecord::new("k-\u{1F511}-\"quoted\"")).unwrap();
        assert_eq!(decode(&bytes).unwrap().secret(), "k-\u{1F511}-\"quoted\"");
    }

    #[test]
    fn malformed_input_is_decoding_error() {
        let cases: [&[u8]; 4] = [b"", b"not json", br#"{"token":"x"}"#, br#"{"api_key":1}"#];
        for bad in cases {
            assert!(matches!(decode(bad), Err(VaultError::Decoding(_))));
        }
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", CredentialRecord::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
