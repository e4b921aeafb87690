//! Token schema versions.
//!
//! The applied version lives in SQLite's `user_version` header field. Each
//! step runs in its own immediate transaction together with the version
//! bump, so a crash leaves the database at a whole step.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use crate::error::{StoreError, StoreResult};

struct SchemaStep {
    version: u32,
    summary: &'static str,
    sql: &'static str,
}

/// Append only. Versions start at 1 and increase by one.
const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        summary: "issued tokens, one live token per user",
        sql: "CREATE TABLE issued_tokens (
                  user_id    TEXT PRIMARY KEY,
                  token      TEXT NOT NULL,
                  created_at INTEGER NOT NULL
              );",
    },
    SchemaStep {
        version: 2,
        summary: "token lookup index",
        // Not UNIQUE: a duplicated token must stay visible to
        // `find_by_token` so it is reported instead of silently resolved.
        sql: "CREATE INDEX idx_issued_tokens_token ON issued_tokens(token);",
    },
];

/// Newest version this build knows how to produce.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |s| s.version)
}

/// Version recorded in the database header. Zero for a fresh file.
pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to [`latest_version`] and return the resulting version.
///
/// Synchronous; runs on the blocking pool via [`crate::Database::call`].
pub fn migrate(conn: &Connection) -> StoreResult<u32> {
    let applied = schema_version(conn)?;
    let latest = latest_version();

    if applied > latest {
        return Err(StoreError::Migration {
            version: applied,
            message: format!("database schema is newer than this build (max v{latest})"),
        });
    }

    let mut version = applied;
    for step in STEPS.iter().filter(|s| s.version > applied) {
        apply(conn, step)?;
        version = step.version;
    }
    Ok(version)
}

fn apply(conn: &Connection, step: &SchemaStep) -> StoreResult<()> {
    let failed = |e: rusqlite::Error| StoreError::Migration {
        version: step.version,
        message: e.to_string(),
    };

    // Dropping the transaction without commit rolls it back.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(failed)?;
    tx.execute_batch(step.sql).map_err(failed)?;
    tx.pragma_update(None, "user_version", step.version)
        .map_err(failed)?;
    tx.commit().map_err(failed)?;

    info!(version = step.version, summary = step.summary, "token schema step applied");
    Ok(())
}
