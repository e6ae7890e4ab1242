//! Trust core for Shipgate.
//!
//! Contains the envelope crypto for secret configuration values, the
//! stateless session token codec, the access policy engine, the audit
//! recorder, and the typed directory over the document store. This crate
//! depends on `shipgate-store` for the storage trait and knows nothing
//! about HTTP or the identity provider's wire protocol.

pub mod audit;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod rbac;
pub mod session;
pub mod types;
