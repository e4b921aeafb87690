//! Storage backends for issued tokens.
//!
//! [`TokenRepository`] is the seam between the credential lifecycle and the
//! storage technology. The server uses [`SqliteTokenRepository`]; tests and
//! throwaway runs use [`MemoryTokenRepository`].

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Upper bound on user IDs returned by [`TokenRepository::find_by_token`].
///
/// Two is enough to tell "exactly one holder" from "shared token".
pub const FIND_LIMIT: usize = 2;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A token issued to a user.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub user_id: String,
    pub token: String,
    /// Unix timestamp of issuance.
    pub created_at: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Trait
// ═══════════════════════════════════════════════════════════════════════

/// Keyed storage for [`IssuedToken`] records, one per user.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// The record for `user_id`, if any.
    async fn get(&self, user_id: &str) -> StoreResult<Option<IssuedToken>>;

    /// Insert or replace the record for `record.user_id`.
    async fn put(&self, record: IssuedToken) -> StoreResult<()>;

    /// Remove the record for `user_id`. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> StoreResult<bool>;

    /// User IDs holding `token`, at most [`FIND_LIMIT`] of them.
    async fn find_by_token(&self, token: &str) -> StoreResult<Vec<String>>;
}

// ═══════════════════════════════════════════════════════════════════════
//  SQLite
// ═══════════════════════════════════════════════════════════════════════

/// [`TokenRepository`] over the `issued_tokens` table.
#[derive(Clone)]
pub struct SqliteTokenRepository {
    db: Database,
}

impl SqliteTokenRepository {
    /// Wrap an already-migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn get(&self, user_id: &str) -> StoreResult<Option<IssuedToken>> {
        let user_id = user_id.to_string();
        self.db
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT user_id, token, created_at FROM issued_tokens WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| {
                        Ok(IssuedToken {
                            user_id: row.get(0)?,
                            token: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    async fn put(&self, record: IssuedToken) -> StoreResult<()> {
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO issued_tokens (user_id, token, created_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                        token = excluded.token, \
                        created_at = excluded.created_at",
                    rusqlite::params![record.user_id, record.token, record.created_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        let user_id = user_id.to_string();
        let affected = self
            .db
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM issued_tokens WHERE user_id = ?1",
                    rusqlite::params![user_id],
                )?;
                Ok(n)
            })
            .await?;
        Ok(affected > 0)
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Vec<String>> {
        let token = token.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id FROM issued_tokens WHERE token = ?1 LIMIT ?2",
                )?;
                let rows = stmt.query_map(rusqlite::params![token, FIND_LIMIT as i64], |row| {
                    row.get::<_, String>(0)
                })?;

                let mut users = Vec::with_capacity(FIND_LIMIT);
                for row in rows {
                    users.push(row?);
                }
                Ok(users)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  In-memory
// ═══════════════════════════════════════════════════════════════════════

/// [`TokenRepository`] held in a concurrent map. Contents die with the
/// process.
#[derive(Debug, Default)]
pub struct MemoryTokenRepository {
    records: DashMap<String, IssuedToken>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenRepository {
    async fn get(&self, user_id: &str) -> StoreResult<Option<IssuedToken>> {
        Ok(self.records.get(user_id).map(|r| r.value().clone()))
    }

    async fn put(&self, record: IssuedToken) -> StoreResult<()> {
        self.records.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.records.remove(user_id).is_some())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Vec<String>> {
        let users: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().token == token)
            .map(|entry| entry.key().clone())
            .take(FIND_LIMIT)
            .collect();
        debug!(matches = users.len(), "scanned in-memory tokens");
        Ok(users)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
