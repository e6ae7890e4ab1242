//! Document store abstraction for Shipgate.
//!
//! This crate defines the [`DocumentStore`] trait — a key-addressed document
//! storage interface that knows nothing about users, teams, or secrets. The
//! directory layer in `shipgate-core` wraps a store to provide typed access
//! to the platform's records.
//!
//! Only the in-memory backend lives here. Production persistence is an
//! external collaborator reached through the same trait; the trust core
//! relies solely on per-document atomicity and the conditional
//! [`put_if_absent`](DocumentStore::put_if_absent) primitive.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

/// A pluggable, key-addressed document store.
///
/// Keys are UTF-8 strings using `/` as a separator (e.g. `users/abc`,
/// `memberships/team-1/user-2`). Values are opaque byte arrays — the
/// directory layer serializes JSON documents into them.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`)
/// and must make individual operations atomic: a concurrent
/// `put_if_absent` race on one key resolves to exactly one winner.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Retrieve a document by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a document, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Store a document only if the key does not already exist.
    ///
    /// Returns `true` if the document was written, `false` if the key was
    /// already present (the existing value is left untouched). This is the
    /// uniqueness primitive backing one-shot operations such as invite
    /// consumption — concurrent callers racing on the same key see exactly
    /// one `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the underlying backend fails.
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Delete a document. Idempotent — deleting a non-existent key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all keys that start with the given prefix.
    ///
    /// Returns keys only, not values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check whether a key exists.
    ///
    /// The default implementation calls [`get`](DocumentStore::get) and
    /// checks for `Some`. Backends may override this with a cheaper check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}
