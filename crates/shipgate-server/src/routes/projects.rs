//! Project environment-variable routes.
//!
//! Every handler goes through [`check_project_access`] first — existence,
//! ownership, and role rank are decided in one place. Secret values are
//! stored encrypted and never appear in listings; reveal is a separate,
//! audited operation with its own role gate.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use shipgate_core::crypto;
use shipgate_core::rbac::check_project_access;
use shipgate_core::types::{EnvVariable, Role, Session};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/projects/{project_id}/env",
            get(list_env).put(put_env),
        )
        .route(
            "/api/projects/{project_id}/env/{env_id}/reveal",
            get(reveal_env),
        )
}

// ── Types ────────────────────────────────────────────────────────────

/// A variable as returned by the listing: secret values are masked.
#[derive(Debug, Serialize)]
struct EnvVariableView {
    id: String,
    key: String,
    /// Plaintext for non-secret variables, `None` for secrets.
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    is_secret: bool,
}

/// One variable in the PUT body. `id` is kept when present so the
/// client can replace a set in place.
#[derive(Debug, Deserialize)]
struct EnvVariableInput {
    id: Option<String>,
    key: String,
    value: String,
    #[serde(default)]
    is_secret: bool,
}

#[derive(Debug, Deserialize)]
struct PutEnvBody {
    variables: Vec<EnvVariableInput>,
}

#[derive(Debug, Serialize)]
struct RevealResponse {
    id: String,
    key: String,
    value: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /api/projects/{id}/env` — list variables with secrets masked.
///
/// Any project role may list; the values of secret variables are never
/// included regardless of role.
async fn list_env(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<EnvVariableView>>, ApiError> {
    let access =
        check_project_access(&state.directory, &sess.user.id, &project_id, None).await?;

    let views = access
        .project
        .env_variables
        .into_iter()
        .map(|v| EnvVariableView {
            id: v.id,
            key: v.key,
            value: if v.is_secret { None } else { Some(v.value) },
            is_secret: v.is_secret,
        })
        .collect();

    Ok(Json(views))
}

/// `PUT /api/projects/{id}/env` — replace the variable set.
///
/// Requires at least `member`. Secret values are envelope-encrypted
/// before they touch storage; non-secret values stay plaintext.
async fn put_env(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path(project_id): Path<String>,
    Json(body): Json<PutEnvBody>,
) -> Result<Json<Vec<EnvVariableView>>, ApiError> {
    let access = check_project_access(
        &state.directory,
        &sess.user.id,
        &project_id,
        Some(Role::Member),
    )
    .await?;

    let mut stored = Vec::with_capacity(body.variables.len());
    for input in body.variables {
        if input.key.is_empty() {
            return Err(ApiError::BadRequest("variable key must not be empty".to_owned()));
        }
        let (value, is_encrypted) = if input.is_secret {
            (crypto::encrypt(&state.envelope_key, &input.value)?, true)
        } else {
            (input.value, false)
        };
        stored.push(EnvVariable {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            key: input.key,
            value,
            is_secret: input.is_secret,
            is_encrypted,
        });
    }

    let mut project = access.project;
    project.env_variables = stored;
    state.directory.upsert_project(&project).await?;

    let team_id = project_team_id(&project);
    state
        .audit
        .record(
            team_id,
            &sess.user.id,
            "project.env_updated",
            json!({
                "project_id": project.id,
                "variable_count": project.env_variables.len(),
            }),
        )
        .await;

    let views = project
        .env_variables
        .into_iter()
        .map(|v| EnvVariableView {
            id: v.id,
            key: v.key,
            value: if v.is_secret { None } else { Some(v.value) },
            is_secret: v.is_secret,
        })
        .collect();
    Ok(Json(views))
}

/// `GET /api/projects/{id}/env/{env_id}/reveal` — decrypt one variable.
///
/// Viewers may not reveal secret values; any role may read a non-secret
/// value through this endpoint. Decryption failures surface as a generic
/// internal error so the response never distinguishes key problems from
/// ciphertext corruption.
async fn reveal_env(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Path((project_id, env_id)): Path<(String, String)>,
) -> Result<Json<RevealResponse>, ApiError> {
    let access =
        check_project_access(&state.directory, &sess.user.id, &project_id, None).await?;

    let variable = access
        .project
        .env_variables
        .iter()
        .find(|v| v.id == env_id)
        .ok_or_else(|| ApiError::NotFound("environment variable not found".to_owned()))?;

    if variable.is_secret && !access.role.meets(Role::Member) {
        return Err(ApiError::Forbidden(
            "viewers cannot reveal secret values".to_owned(),
        ));
    }

    let value = if variable.is_encrypted {
        crypto::decrypt(&state.envelope_key, &variable.value).map_err(|err| {
            warn!(project_id = %project_id, env_id = %env_id, error = %err, "reveal decryption failed");
            ApiError::from(err)
        })?
    } else {
        variable.value.clone()
    };

    if variable.is_secret {
        state
            .audit
            .record(
                project_team_id(&access.project),
                &sess.user.id,
                "secret.revealed",
                json!({"project_id": project_id, "env_id": env_id, "key": variable.key}),
            )
            .await;
    }

    Ok(Json(RevealResponse {
        id: variable.id.clone(),
        key: variable.key.clone(),
        value,
    }))
}

fn project_team_id(project: &shipgate_core::types::Project) -> Option<&str> {
    match &project.owner {
        shipgate_core::types::ProjectOwner::Team(team_id) => Some(team_id),
        shipgate_core::types::ProjectOwner::User(_) => None,
    }
}
