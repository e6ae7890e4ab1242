//! Project access control.
//!
//! A single entry point, [`check_project_access`], gates every project
//! operation. The outcome is either the project plus the caller's
//! effective role, or a typed denial — existence, membership, and rank
//! are all decided here so route handlers never re-derive them.

use crate::directory::Directory;
use crate::error::AccessError;
use crate::types::{Project, ProjectOwner, Role};

/// A granted access decision: the project and the caller's effective role
/// on it. For personal projects the owner's effective role is `Owner`.
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: Role,
}

/// Resolve whether `user_id` may act on `project_id`.
///
/// Resolution order:
///
/// 1. The project must exist, otherwise [`AccessError::NotFound`].
/// 2. For a personal project, only the exact owner passes; the effective
///    role is `Owner` and any `min_role` is satisfied.
/// 3. For a team project, the caller must hold a membership in the owning
///    team; the membership role is the effective role.
/// 4. If `min_role` is given, the effective role must meet it, otherwise
///    [`AccessError::Forbidden`] naming the required rank.
///
/// Directory failures resolve to [`AccessError::Internal`] — access is
/// denied when the answer is unknowable.
///
/// # Errors
///
/// Returns [`AccessError`] for every non-granted outcome as described
/// above.
pub async fn check_project_access(
    directory: &Directory,
    user_id: &str,
    project_id: &str,
    min_role: Option<Role>,
) -> Result<ProjectAccess, AccessError> {
    let project = directory
        .get_project_by_id(project_id)
        .await?
        .ok_or(AccessError::NotFound)?;

    let role = match &project.owner {
        ProjectOwner::User(owner_id) => {
            if owner_id != user_id {
                return Err(AccessError::Forbidden(
                    "not the project owner".to_owned(),
                ));
            }
            Role::Owner
        }
        ProjectOwner::Team(team_id) => {
            let membership = directory
                .get_team_membership(team_id, user_id)
                .await?
                .ok_or_else(|| {
                    AccessError::Forbidden("not a member of the owning team".to_owned())
                })?;
            membership.role
        }
    };

    if let Some(min) = min_role {
        if !role.meets(min) {
            return Err(AccessError::insufficient_role(min));
        }
    }

    Ok(ProjectAccess { project, role })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shipgate_store::MemoryStore;
    use uuid::Uuid;

    use super::*;
    use crate::types::{ExternalProfile, Project};

    async fn seed_user(dir: &Directory, github_id: i64) -> String {
        let profile = ExternalProfile {
            github_id,
            github_username: format!("user-{github_id}"),
            name: None,
            email: None,
            avatar_url: String::new(),
        };
        dir.upsert_user(&profile).await.unwrap().id
    }

    async fn seed_project(dir: &Directory, owner: ProjectOwner) -> String {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: "api".to_owned(),
            owner,
            env_variables: Vec::new(),
        };
        dir.upsert_project(&project).await.unwrap();
        project.id
    }

    fn directory() -> Directory {
        Directory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let dir = directory();
        let err = check_project_access(&dir, "u1", "nope", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound));
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn personal_project_admits_only_exact_owner() {
        let dir = directory();
        let owner = seed_user(&dir, 1).await;
        let other = seed_user(&dir, 2).await;
        let project = seed_project(&dir, ProjectOwner::User(owner.clone())).await;

        let access = check_project_access(&dir, &owner, &project, Some(Role::Owner))
            .await
            .unwrap();
        assert_eq!(access.role, Role::Owner);

        let err = check_project_access(&dir, &other, &project, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
        assert_eq!(err.status(), 403);
    }

    #[tokio::test]
    async fn team_non_member_is_forbidden() {
        let dir = directory();
        let owner = seed_user(&dir, 1).await;
        let outsider = seed_user(&dir, 2).await;
        let team = dir.create_team("Platform", &owner).await.unwrap();
        let project = seed_project(&dir, ProjectOwner::Team(team.id)).await;

        let err = check_project_access(&dir, &outsider, &project, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }

    #[tokio::test]
    async fn team_member_rank_gates_min_role() {
        let dir = directory();
        let owner = seed_user(&dir, 1).await;
        let member = seed_user(&dir, 2).await;
        let team = dir.create_team("Platform", &owner).await.unwrap();
        let invite = dir
            .create_invite(&team.id, "m@x.y", Role::Member, &owner)
            .await
            .unwrap();
        dir.accept_invite(&invite, &member).await.unwrap();
        let project = seed_project(&dir, ProjectOwner::Team(team.id)).await;

        // member >= member and member >= viewer pass.
        for min in [None, Some(Role::Viewer), Some(Role::Member)] {
            let access = check_project_access(&dir, &member, &project, min)
                .await
                .unwrap();
            assert_eq!(access.role, Role::Member);
        }

        // member < admin fails with the required rank in the message.
        let err = check_project_access(&dir, &member, &project, Some(Role::Admin))
            .await
            .unwrap_err();
        match err {
            AccessError::Forbidden(msg) => assert!(msg.contains("admin"), "{msg}"),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn team_owner_meets_every_min_role() {
        let dir = directory();
        let owner = seed_user(&dir, 1).await;
        let team = dir.create_team("Platform", &owner).await.unwrap();
        let project = seed_project(&dir, ProjectOwner::Team(team.id)).await;

        for min in [Role::Viewer, Role::Member, Role::Admin, Role::Owner] {
            let access = check_project_access(&dir, &owner, &project, Some(min))
                .await
                .unwrap();
            assert_eq!(access.role, Role::Owner);
        }
    }
}
