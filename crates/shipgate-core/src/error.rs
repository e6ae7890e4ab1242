//! Error types for `shipgate-core`.
//!
//! Each variant carries enough context to diagnose the problem without a
//! debugger. Crypto errors never include key material or plaintext — only
//! operation descriptions.

use shipgate_store::StoreError;

use crate::types::Role;

/// Errors from envelope encryption and key derivation.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation from the master secret failed.
    #[error("key derivation failed: {reason}")]
    KeyDerivation { reason: String },

    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// The envelope does not have the `nonce:tag:ciphertext` shape.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Authentication failed — wrong key, corrupted ciphertext, or a
    /// tampered tag. No partial plaintext is ever returned.
    #[error("decryption failed")]
    Decryption,
}

/// Outcome of a denied or failed project access check.
///
/// Authorization failures are never downgraded to success; infrastructure
/// failures resolve to [`AccessError::Internal`], denying access.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The project does not exist.
    #[error("project not found")]
    NotFound,

    /// The principal is not allowed to act on the project.
    #[error("{0}")]
    Forbidden(String),

    /// A lookup failed for infrastructure reasons — fail closed.
    #[error("access check failed: {0}")]
    Internal(#[from] DirectoryError),
}

impl AccessError {
    /// HTTP status this outcome maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Forbidden(_) => 403,
            Self::Internal(_) => 500,
        }
    }

    /// A denial naming the minimum role the operation requires.
    #[must_use]
    pub fn insufficient_role(required: Role) -> Self {
        Self::Forbidden(format!("requires role '{required}' or higher"))
    }
}

/// Errors from the typed directory layer.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The underlying document store failed.
    #[error("directory store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document could not be decoded.
    #[error("corrupt document at '{key}': {reason}")]
    CorruptDocument { key: String, reason: String },

    /// A document could not be encoded for storage.
    #[error("failed to encode document: {reason}")]
    Encode { reason: String },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl DirectoryError {
    pub(crate) fn corrupt(key: &str, err: &serde_json::Error) -> Self {
        Self::CorruptDocument {
            key: key.to_owned(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn encode(err: &serde_json::Error) -> Self {
        Self::Encode {
            reason: err.to_string(),
        }
    }
}

/// Errors internal to the audit recorder.
///
/// These never propagate out of [`crate::audit::AuditLog::record`] — audit
/// recording is a best-effort side effect. They do surface from reads.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The underlying document store failed.
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization of an audit entry failed.
    #[error("audit serialization failed: {reason}")]
    Serialization { reason: String },
}
