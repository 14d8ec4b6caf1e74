//! Access-control helpers for projects and clients.
//!
//! A user can access a project when they are an admin, own the project, are a
//! direct project member, or are a member of the project's client. The same
//! rule backs the visibility gate, through [`project_accessible`].

use crate::db::{MembershipSnapshot, ProjectAccessRow, TranscriptDb};
use crate::error::{GateError, Result};
use crate::store::VisibilityStore;

/// Owner, direct project membership, or client membership. Admin status is
/// checked separately by callers.
pub fn project_accessible(
    user_id: &str,
    project: &ProjectAccessRow,
    memberships: &MembershipSnapshot,
) -> bool {
    project.owner_user_id.as_deref() == Some(user_id)
        || memberships.project_ids.contains(&project.id)
        || memberships.client_ids.contains(&project.client_id)
}

pub fn is_admin<S: VisibilityStore + ?Sized>(store: &S, user_id: &str) -> Result<bool> {
    Ok(store.is_admin(user_id)?)
}

pub fn can_access_project<S: VisibilityStore + ?Sized>(
    store: &S,
    user_id: &str,
    project_id: &str,
) -> Result<bool> {
    if store.is_admin(user_id)? {
        return Ok(true);
    }
    let rows = store.project_access_rows(&[project_id.to_string()])?;
    let Some(project) = rows.into_iter().find(|p| p.id == project_id) else {
        return Ok(false);
    };
    let memberships = store.membership_snapshot(user_id)?;
    Ok(project_accessible(user_id, &project, &memberships))
}

pub fn assert_project_access<S: VisibilityStore + ?Sized>(
    store: &S,
    user_id: &str,
    project_id: &str,
) -> Result<()> {
    if can_access_project(store, user_id, project_id)? {
        Ok(())
    } else {
        Err(GateError::access_denied("Forbidden project"))
    }
}

/// Admin, client owner, or client member.
pub fn assert_client_access(db: &TranscriptDb, user_id: &str, client_id: &str) -> Result<()> {
    if db.user_is_admin(user_id)? {
        return Ok(());
    }
    if let Some(client) = db.get_client(client_id)? {
        if client.owner_user_id.as_deref() == Some(user_id) {
            return Ok(());
        }
    }
    if db.membership_snapshot(user_id)?.client_ids.contains(client_id) {
        return Ok(());
    }
    Err(GateError::access_denied("Forbidden client"))
}
