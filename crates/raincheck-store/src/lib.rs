//! # raincheck-store
//!
//! Server-side lifecycle of per-user access tokens.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  CredentialStore (issue / lookup /      │
//! │                   revoke / resolve)     │
//! │  TokenIssuer     (ring CSPRNG, hex)     │
//! ├─────────────────────────────────────────┤
//! │  TokenRepository                        │
//! │    SqliteTokenRepository  (default)     │
//! │    MemoryTokenRepository  (DashMap)     │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL)                │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use raincheck_store::{CredentialStore, Database};
//!
//! let db = Database::open_and_migrate("data/raincheck.db").await?;
//! let store = CredentialStore::sqlite(db);
//! let token = store.issue("user-42").await?;
//! assert_eq!(store.find_user_by_token(&token).await?, "user-42");
//! ```

pub mod credentials;
pub mod db;
pub mod error;
pub mod issuer;
pub mod migration;
pub mod repository;

// ── re-exports ───────────────────────────────────────────────────────

pub use credentials::CredentialStore;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use issuer::{TOKEN_LEN, TokenIssuer, fingerprint};
pub use repository::{IssuedToken, MemoryTokenRepository, SqliteTokenRepository, TokenRepository};
