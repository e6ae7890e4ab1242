//! Typed directory over the document store.
//!
//! Wraps a [`DocumentStore`] with the record semantics the trust core
//! needs: users keyed by external identity, teams with unique (team, user)
//! memberships, one-shot invites, and projects. All mutation relies on the
//! store's per-document atomicity — there is no cross-document transaction
//! and none is needed.
//!
//! # Key layout
//!
//! - `users/{id}` — user record
//! - `users/by-github/{github_id}` — external-identity index → user id
//! - `teams/{id}` — team record
//! - `memberships/{team_id}/{user_id}` — membership record
//! - `invites/{team_id}/{invite_id}` — invite record
//! - `invites/by-token/{token}` — invite token index
//! - `projects/{id}` — project record

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use shipgate_store::DocumentStore;

use crate::error::DirectoryError;
use crate::types::{
    ExternalProfile, Invite, Project, Role, Subscription, Team, TeamMembership, User,
};

/// Invite validity window.
const INVITE_TTL_DAYS: i64 = 7;

/// Typed record access for the trust core.
pub struct Directory {
    store: Arc<dyn DocumentStore>,
}

impl Directory {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // ── Users ────────────────────────────────────────────────────────

    /// Create or refresh a user from an external profile.
    ///
    /// Keyed by the external identity id: the first login creates the
    /// record, every later login refreshes the profile fields while
    /// preserving id, subscription, and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or a document is
    /// corrupt.
    pub async fn upsert_user(&self, profile: &ExternalProfile) -> Result<User, DirectoryError> {
        let index_key = format!("users/by-github/{}", profile.github_id);
        let existing_id: Option<String> = self.get_doc(&index_key).await?;

        let now = Utc::now();
        let user = if let Some(id) = existing_id {
            let key = format!("users/{id}");
            let mut user: User =
                self.get_doc(&key)
                    .await?
                    .ok_or_else(|| DirectoryError::NotFound {
                        kind: "user",
                        id: id.clone(),
                    })?;
            user.github_username = profile.github_username.clone();
            user.name = profile.name.clone();
            user.email = profile.email.clone();
            user.avatar_url = profile.avatar_url.clone();
            user.updated_at = now;
            self.put_doc(&key, &user).await?;
            user
        } else {
            let user = User {
                id: Uuid::new_v4().to_string(),
                github_id: profile.github_id,
                github_username: profile.github_username.clone(),
                name: profile.name.clone(),
                email: profile.email.clone(),
                avatar_url: profile.avatar_url.clone(),
                subscription: Subscription::default(),
                created_at: now,
                updated_at: now,
            };
            self.put_doc(&format!("users/{}", user.id), &user).await?;
            self.put_doc(&index_key, &user.id).await?;
            user
        };

        Ok(user)
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        self.get_doc(&format!("users/{id}")).await
    }

    /// Replace a user's subscription snapshot.
    ///
    /// The caller must re-issue any live session token afterwards — the
    /// token, not this record, is what request authorization reads.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if the user does not exist.
    pub async fn update_user_subscription(
        &self,
        id: &str,
        subscription: Subscription,
    ) -> Result<User, DirectoryError> {
        let key = format!("users/{id}");
        let mut user: User = self
            .get_doc(&key)
            .await?
            .ok_or_else(|| DirectoryError::NotFound {
                kind: "user",
                id: id.to_owned(),
            })?;
        user.subscription = subscription;
        user.updated_at = Utc::now();
        self.put_doc(&key, &user).await?;
        Ok(user)
    }

    // ── Teams & memberships ──────────────────────────────────────────

    /// Create a team; the creator becomes its `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn create_team(
        &self,
        name: &str,
        creator_id: &str,
    ) -> Result<Team, DirectoryError> {
        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            created_at: now,
        };
        let membership = TeamMembership {
            team_id: team.id.clone(),
            user_id: creator_id.to_owned(),
            role: Role::Owner,
            joined_at: now,
        };
        self.put_doc(&format!("teams/{}", team.id), &team).await?;
        self.put_doc(
            &format!("memberships/{}/{creator_id}", team.id),
            &membership,
        )
        .await?;
        Ok(team)
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_team(&self, id: &str) -> Result<Option<Team>, DirectoryError> {
        self.get_doc(&format!("teams/{id}")).await
    }

    /// Delete a team along with its memberships and pending invites.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn delete_team(&self, id: &str) -> Result<(), DirectoryError> {
        for key in self.store.list(&format!("memberships/{id}/")).await? {
            self.store.delete(&key).await?;
        }
        for key in self.store.list(&format!("invites/{id}/")).await? {
            let invite: Option<Invite> = self.get_doc(&key).await?;
            if let Some(invite) = invite {
                self.store
                    .delete(&format!("invites/by-token/{}", invite.token))
                    .await?;
            }
            self.store.delete(&key).await?;
        }
        self.store.delete(&format!("teams/{id}")).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_team_membership(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<TeamMembership>, DirectoryError> {
        self.get_doc(&format!("memberships/{team_id}/{user_id}")).await
    }

    /// List every membership in a team.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or a document is
    /// corrupt.
    pub async fn list_team_memberships(
        &self,
        team_id: &str,
    ) -> Result<Vec<TeamMembership>, DirectoryError> {
        let keys = self.store.list(&format!("memberships/{team_id}/")).await?;
        let mut memberships = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(membership) = self.get_doc(&key).await? {
                memberships.push(membership);
            }
        }
        Ok(memberships)
    }

    /// Remove a member from a team.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn remove_team_membership(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<(), DirectoryError> {
        self.store
            .delete(&format!("memberships/{team_id}/{user_id}"))
            .await?;
        Ok(())
    }

    // ── Invites ──────────────────────────────────────────────────────

    /// Create a pending invite with a fresh random token and a 7-day
    /// validity window.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn create_invite(
        &self,
        team_id: &str,
        email: &str,
        role: Role,
        inviter_id: &str,
    ) -> Result<Invite, DirectoryError> {
        let now = Utc::now();
        let invite = Invite {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            team_id: team_id.to_owned(),
            email: email.to_owned(),
            role,
            inviter_id: inviter_id.to_owned(),
            expires_at: now + Duration::days(INVITE_TTL_DAYS),
            created_at: now,
        };
        self.put_doc(&format!("invites/{team_id}/{}", invite.id), &invite)
            .await?;
        self.put_doc(&format!("invites/by-token/{}", invite.token), &invite)
            .await?;
        Ok(invite)
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_invite_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Invite>, DirectoryError> {
        self.get_doc(&format!("invites/by-token/{token}")).await
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_invite(
        &self,
        team_id: &str,
        invite_id: &str,
    ) -> Result<Option<Invite>, DirectoryError> {
        self.get_doc(&format!("invites/{team_id}/{invite_id}")).await
    }

    /// Consume an invite: create the membership and delete the invite.
    ///
    /// Returns `true` if a new membership was created, `false` if the user
    /// was already a member. The membership insert is conditional on the
    /// (team, user) key, so concurrent double-accepts resolve to one
    /// winner without a mutex; invite deletion is idempotent either way.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn accept_invite(
        &self,
        invite: &Invite,
        user_id: &str,
    ) -> Result<bool, DirectoryError> {
        let membership = TeamMembership {
            team_id: invite.team_id.clone(),
            user_id: user_id.to_owned(),
            role: invite.role,
            joined_at: Utc::now(),
        };
        let body = serde_json::to_vec(&membership).map_err(|e| DirectoryError::encode(&e))?;
        let created = self
            .store
            .put_if_absent(
                &format!("memberships/{}/{user_id}", invite.team_id),
                &body,
            )
            .await?;

        self.delete_invite(invite).await?;
        Ok(created)
    }

    /// Delete an invite (revocation or post-consumption cleanup).
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn delete_invite(&self, invite: &Invite) -> Result<(), DirectoryError> {
        self.store
            .delete(&format!("invites/{}/{}", invite.team_id, invite.id))
            .await?;
        self.store
            .delete(&format!("invites/by-token/{}", invite.token))
            .await?;
        Ok(())
    }

    // ── Projects ─────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails or the document is
    /// corrupt.
    pub async fn get_project_by_id(&self, id: &str) -> Result<Option<Project>, DirectoryError> {
        self.get_doc(&format!("projects/{id}")).await
    }

    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the store fails.
    pub async fn upsert_project(&self, project: &Project) -> Result<(), DirectoryError> {
        self.put_doc(&format!("projects/{}", project.id), project).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DirectoryError> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| DirectoryError::corrupt(key, &e)),
        }
    }

    async fn put_doc<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DirectoryError> {
        let body = serde_json::to_vec(value).map_err(|e| DirectoryError::encode(&e))?;
        self.store.put(key, &body).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory").finish_non_exhaustive()
    }
}
