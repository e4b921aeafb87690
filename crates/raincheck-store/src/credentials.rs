//! Per-user access token lifecycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::issuer::{TokenIssuer, fingerprint};
use crate::repository::{IssuedToken, MemoryTokenRepository, SqliteTokenRepository, TokenRepository};

/// Issues, looks up, revokes and resolves per-user access tokens.
///
/// Each user holds at most one live token. Issuing again replaces the old
/// one, which stops authenticating immediately.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn TokenRepository>,
    issuer: TokenIssuer,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn TokenRepository>) -> Self {
        Self {
            repo,
            issuer: TokenIssuer::new(),
        }
    }

    /// Store backed by a migrated SQLite database.
    pub fn sqlite(db: Database) -> Self {
        Self::new(Arc::new(SqliteTokenRepository::new(db)))
    }

    /// Store whose contents die with the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenRepository::new()))
    }

    /// Replace any token `user_id` holds with a freshly generated one.
    ///
    /// Delete and insert are two steps. A failure between them leaves the
    /// user with no token, never with two.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: &str) -> StoreResult<String> {
        require_user_id(user_id)?;

        let replaced = self.repo.delete(user_id).await?;
        let token = self.issuer.generate()?;

        self.repo
            .put(IssuedToken {
                user_id: user_id.to_string(),
                token: token.clone(),
                created_at: Utc::now().timestamp(),
            })
            .await?;

        info!(replaced, token = %fingerprint(&token), "issued access token");
        Ok(token)
    }

    /// The live token for `user_id`.
    ///
    /// Returns [`StoreError::NotFound`] when the user holds none.
    #[instrument(skip(self))]
    pub async fn lookup(&self, user_id: &str) -> StoreResult<IssuedToken> {
        require_user_id(user_id)?;

        self.repo
            .get(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "issued token",
                id: user_id.to_string(),
            })
    }

    /// Remove the user's token. Succeeds whether or not one existed.
    #[instrument(skip(self))]
    pub async fn revoke(&self, user_id: &str) -> StoreResult<()> {
        require_user_id(user_id)?;

        let removed = self.repo.delete(user_id).await?;
        debug!(removed, "revoked access token");
        Ok(())
    }

    /// The user holding `token`.
    ///
    /// - [`StoreError::InvalidToken`] when nobody holds it.
    /// - [`StoreError::Consistency`] when more than one user does.
    #[instrument(skip_all, fields(token = %fingerprint(token)))]
    pub async fn find_user_by_token(&self, token: &str) -> StoreResult<String> {
        if token.is_empty() {
            return Err(StoreError::InvalidToken);
        }

        let mut holders = self.repo.find_by_token(token).await?;
        match holders.len() {
            0 => Err(StoreError::InvalidToken),
            1 => Ok(holders.remove(0)),
            matches => {
                error!(matches, "token held by more than one user");
                Err(StoreError::Consistency { matches })
            }
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

fn require_user_id(user_id: &str) -> StoreResult<()> {
    if user_id.is_empty() {
        return Err(StoreError::InvalidArgument(
            "user_id must not be empty".into(),
        ));
    }
    Ok(())
}
