//! Team, invite, and audit-log routes.
//!
//! Team-scoped operations check the caller's membership in the target
//! team before anything else: invite management needs `admin`, team
//! deletion needs `owner`, and audit reads need plain membership. Invite
//! acceptance is the one cross-team operation — it authenticates by
//! invite token, not by membership.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use shipgate_core::audit::DEFAULT_LIST_LIMIT;
use shipgate_core::types::{AuditLogEntry, Invite, Role, Session, Team, TeamMembership};

use crate::error::ApiError;
use crate::state::AppState;

/// Hard cap on one audit-log page, whatever the client asks for.
const AUDIT_LIST_MAX: usize = 200;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/teams", post(create_team))
        .route("/api/teams/{team_id}", delete(delete_team))
        .route("/api/teams/{team_id}/invites", post(create_invite))
        .route(
            "/api/teams/{team_id}/invites/{invite_id}",
            delete(revoke_invite),
        )
        .route("/api/invites/accept", post(accept_invite))
        .route(
            "/api/teams/{team_id}/members/{user_id}",
            delete(remove_member),
        )
        .route("/api/teams/{team_id}/audit-logs", get(list_audit_logs))
}

// ── Types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateTeamBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateInviteBody {
    email: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct AcceptInviteBody {
    token: String,
}

#[derive(Debug, Serialize)]
struct AcceptInviteResponse {
    team: Team,
    role: Role,
    /// `false` when the caller was already a member; the invite is
    /// consumed either way.
    joined: bool,
}

#[derive(Debug, Deserialize)]
struct AuditLogsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AuditLogsResponse {
    entries: Vec<AuditLogEntry>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `POST /api/teams` — create a team; the caller becomes its owner.
async fn create_team(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Json(body): Json<CreateTeamBody>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("team name must not be empty".to_owned()));
    }

    let team = state.directory.create_team(name, &sess.user.id).await?;
    state
        .audit
        .record(
            Some(&team.id),
            &sess.user.id,
            "team.created",
            json!({"name": team.name}),
        )
        .await;

    Ok((StatusCode::CREATED, Json(team)))
}

/// `DELETE /api/teams/{id}` — delete a team and everything scoped to it.
///
/// Owner only. Memberships and pending invites go with the team.
async fn delete_team(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path(team_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let membership = require_team_role(&state, &team_id, &sess.user.id, Role::Owner).await?;

    state.directory.delete_team(&team_id).await?;
    state
        .audit
        .record(
            None,
            &sess.user.id,
            "team.deleted",
            json!({"team_id": membership.team_id}),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/teams/{id}/invites` — create a pending invite.
///
/// Admin or above. Ownership is not grantable by invite.
async fn create_invite(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path(team_id): Path<String>,
    Json(body): Json<CreateInviteBody>,
) -> Result<(StatusCode, Json<Invite>), ApiError> {
    require_team_role(&state, &team_id, &sess.user.id, Role::Admin).await?;

    if body.role == Role::Owner {
        return Err(ApiError::BadRequest(
            "cannot invite a user as owner".to_owned(),
        ));
    }
    if body.email.trim().is_empty() {
        return Err(ApiError::BadRequest("invite email must not be empty".to_owned()));
    }

    let invite = state
        .directory
        .create_invite(&team_id, body.email.trim(), body.role, &sess.user.id)
        .await?;
    state
        .audit
        .record(
            Some(&team_id),
            &sess.user.id,
            "invite.created",
            json!({"email": invite.email, "role": invite.role}),
        )
        .await;

    Ok((StatusCode::CREATED, Json(invite)))
}

/// `DELETE /api/teams/{id}/invites/{invite_id}` — revoke a pending invite.
async fn revoke_invite(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path((team_id, invite_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_team_role(&state, &team_id, &sess.user.id, Role::Admin).await?;

    let invite = state
        .directory
        .get_invite(&team_id, &invite_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("invite not found".to_owned()))?;

    state.directory.delete_invite(&invite).await?;
    state
        .audit
        .record(
            Some(&team_id),
            &sess.user.id,
            "invite.revoked",
            json!({"invite_id": invite.id, "email": invite.email}),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/invites/accept` — join a team via an invite token.
///
/// An unknown token is a 404; an expired one is a 410 and the invite is
/// removed so the token cannot be retried. Acceptance never changes an
/// existing membership's role.
async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Json(body): Json<AcceptInviteBody>,
) -> Result<Json<AcceptInviteResponse>, ApiError> {
    let invite = state
        .directory
        .get_invite_by_token(&body.token)
        .await?
        .ok_or_else(|| ApiError::NotFound("invite not found".to_owned()))?;

    if invite.is_expired(Utc::now()) {
        state.directory.delete_invite(&invite).await?;
        return Err(ApiError::Gone("invite has expired".to_owned()));
    }

    let team = state
        .directory
        .get_team(&invite.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("team not found".to_owned()))?;

    let joined = state.directory.accept_invite(&invite, &sess.user.id).await?;
    if joined {
        state
            .audit
            .record(
                Some(&invite.team_id),
                &sess.user.id,
                "member.joined",
                json!({"role": invite.role, "invite_id": invite.id}),
            )
            .await;
    }

    Ok(Json(AcceptInviteResponse {
        team,
        role: invite.role,
        joined,
    }))
}

/// `DELETE /api/teams/{id}/members/{user_id}` — remove a member.
///
/// Admin or above. Rank still matters between requester and target:
/// an admin cannot remove an owner, and the last owner can never be
/// removed — the team must always have one.
async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path((team_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let requester = require_team_role(&state, &team_id, &sess.user.id, Role::Admin).await?;

    let target = state
        .directory
        .get_team_membership(&team_id, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("member not found".to_owned()))?;

    if target.role == Role::Owner && requester.role != Role::Owner {
        return Err(ApiError::Forbidden(
            "admins cannot remove owners".to_owned(),
        ));
    }

    if target.role == Role::Owner {
        let members = state.directory.list_team_memberships(&team_id).await?;
        let owners = members.iter().filter(|m| m.role == Role::Owner).count();
        if owners <= 1 {
            return Err(ApiError::BadRequest(
                "cannot remove the last owner".to_owned(),
            ));
        }
    }

    state
        .directory
        .remove_team_membership(&team_id, &user_id)
        .await?;
    state
        .audit
        .record(
            Some(&team_id),
            &sess.user.id,
            "member.removed",
            json!({"removed_user_id": user_id}),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/teams/{id}/audit-logs?limit=` — the team's audit trail,
/// newest first. Any member may read; `limit` is capped at 200.
async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path(team_id): Path<String>,
    Query(query): Query<AuditLogsQuery>,
) -> Result<Json<AuditLogsResponse>, ApiError> {
    require_team_role(&state, &team_id, &sess.user.id, Role::Viewer).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, AUDIT_LIST_MAX);
    let entries = state.audit.list(&team_id, Some(limit)).await?;

    Ok(Json(AuditLogsResponse { entries }))
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Resolve the caller's membership in `team_id` and require `min` rank.
///
/// A missing team is a 404; a missing membership or insufficient rank is
/// a 403.
async fn require_team_role(
    state: &Arc<AppState>,
    team_id: &str,
    user_id: &str,
    min: Role,
) -> Result<TeamMembership, ApiError> {
    if state.directory.get_team(team_id).await?.is_none() {
        return Err(ApiError::NotFound("team not found".to_owned()));
    }

    let membership = state
        .directory
        .get_team_membership(team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("not a member of this team".to_owned()))?;

    if !membership.role.meets(min) {
        return Err(ApiError::Forbidden(format!(
            "requires role '{min}' or higher"
        )));
    }

    Ok(membership)
}
