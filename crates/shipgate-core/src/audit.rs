//! Append-only audit trail.
//!
//! Every security-relevant mutation records who did what, when. Recording
//! is a best-effort side effect of the primary operation: a failed write
//! is logged and swallowed, never surfaced to the caller — an audit
//! outage must not block logins or deploys. Reads do surface errors.
//!
//! Entries are keyed `audit/{scope}/{timestamp}-{id}` with a
//! zero-padded millisecond timestamp, so the store's ordered listing
//! yields chronological order and newest-first is a reverse scan.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use shipgate_store::DocumentStore;

use crate::error::AuditError;
use crate::types::AuditLogEntry;

/// Scope segment for account-level events with no team.
const ACCOUNT_SCOPE: &str = "account";

/// Default number of entries returned by [`AuditLog::list`].
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Recorder and reader for the audit trail.
pub struct AuditLog {
    store: Arc<dyn DocumentStore>,
}

impl AuditLog {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record an audit event. Best-effort: failures are logged at `warn`
    /// and swallowed.
    ///
    /// `team_id` of `None` files the event under the account scope
    /// (login, logout, and other user-level events).
    pub async fn record(
        &self,
        team_id: Option<&str>,
        actor_user_id: &str,
        action: &str,
        metadata: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            team_id: team_id.map(str::to_owned),
            actor_user_id: actor_user_id.to_owned(),
            action: action.to_owned(),
            metadata,
            created_at: Utc::now(),
        };

        if let Err(err) = self.append(&entry).await {
            warn!(action, error = %err, "failed to record audit entry");
        }
    }

    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        let scope = entry.team_id.as_deref().unwrap_or(ACCOUNT_SCOPE);
        let key = format!(
            "audit/{scope}/{:020}-{}",
            entry.created_at.timestamp_millis(),
            entry.id
        );
        let body = serde_json::to_vec(entry).map_err(|e| AuditError::Serialization {
            reason: e.to_string(),
        })?;
        self.store.put(&key, &body).await?;
        Ok(())
    }

    /// List a team's audit entries, newest first.
    ///
    /// Returns at most `limit` entries, defaulting to
    /// [`DEFAULT_LIST_LIMIT`]. Entries that fail to decode are skipped
    /// with a warning rather than poisoning the whole listing.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the store listing or a read fails.
    pub async fn list(
        &self,
        team_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let keys = self.store.list(&format!("audit/{team_id}/")).await?;

        let mut entries = Vec::with_capacity(limit.min(keys.len()));
        for key in keys.iter().rev().take(limit) {
            let Some(bytes) = self.store.get(key).await? else {
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(key, error = %err, "skipping corrupt audit entry"),
            }
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}
