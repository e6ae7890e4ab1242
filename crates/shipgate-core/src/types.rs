//! Domain types for the Shipgate trust core.
//!
//! Roles carry an explicit total order so minimum-privilege checks compare
//! ranks, never strings. Project ownership is a tagged variant — a project
//! is personal or team-owned, structurally never both.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team role, ordered by privilege: `Viewer < Member < Admin < Owner`.
///
/// The derived `Ord` follows variant declaration order, so rank comparisons
/// are `role >= min_role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Check whether this role has at least the privilege of `min`.
    #[must_use]
    pub fn meets(self, min: Self) -> bool {
        self >= min
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Role`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(ParseRoleError(s.to_owned())),
        }
    }
}

/// Billing tier carried in the subscription snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Team,
    Enterprise,
}

/// Subscription snapshot embedded in the user record and session token.
///
/// Authorization-relevant: any server-side change to this data requires
/// active re-issuance of the session token — there is no server-side
/// session store to patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Subscription {
    pub tier: SubscriptionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// An authenticated principal. Created on first successful OAuth login,
/// profile-refreshed on every login, never implicitly destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub github_id: i64,
    pub github_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub avatar_url: String,
    #[serde(default)]
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields refreshed from the identity provider on each login.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    pub github_id: i64,
    pub github_username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a team. Unique per (team, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: String,
    pub user_id: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Project ownership — personal or team-owned, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ProjectOwner {
    User(String),
    Team(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner: ProjectOwner,
    #[serde(default)]
    pub env_variables: Vec<EnvVariable>,
}

/// An environment variable on a project.
///
/// Invariant: when `is_secret && is_encrypted`, `value` is ciphertext in
/// the envelope wire format. Otherwise `value` is plaintext — the legacy
/// non-encrypted path is still honored for backward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVariable {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub is_encrypted: bool,
}

/// A pending team invite. Consumed exactly once by invite acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub token: String,
    pub team_id: String,
    pub email: String,
    pub role: Role,
    pub inviter_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// Whether the invite has passed its validity window at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A single append-only audit record. `team_id` is `None` for
/// account-level events such as login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub team_id: Option<String>,
    pub actor_user_id: String,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A verified session — the decoded contents of a valid session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    /// Identity-provider access token carried for upstream API calls.
    pub access_token: String,
    /// Unix seconds at which the session token expires.
    pub expires_at: i64,
}
