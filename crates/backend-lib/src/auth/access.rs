//! Authorization decisions on top of a resolved identity.
use std::sync::Arc;

use volunteer_common::Role;

use super::identity::ResolvedIdentity;
use crate::error::AppError;
use crate::storage::{UserRecord, UserStore};

/// Coarse-grained permission checks: is-admin and current user id
#[derive(Clone)]
pub struct AccessGate {
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").finish_non_exhaustive()
    }
}

impl AccessGate {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// A role on the identity decides on its own. Without one the stored
    /// admin flag is consulted; any lookup failure answers `false`.
    pub async fn is_admin(&self, identity: &ResolvedIdentity) -> bool {
        if let Some(role) = identity.role {
            return role == Role::Admin;
        }
        if !identity.is_authenticated() {
            return false;
        }

        match self.lookup(identity).await {
            Ok(Some(user)) => user.is_admin,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    user_id = ?identity.user_id,
                    "admin flag lookup failed, treating caller as non-admin"
                );
                false
            },
        }
    }

    pub fn current_user_id(&self, identity: &ResolvedIdentity) -> Option<i64> {
        identity.user_id
    }

    /// `Unauthorized` for anonymous callers, `Forbidden` for non-admins
    pub async fn require_admin(&self, identity: &ResolvedIdentity) -> Result<(), AppError> {
        if !identity.is_authenticated() {
            return Err(AppError::Unauthorized);
        }
        if !self.is_admin(identity).await {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    async fn lookup(&self, identity: &ResolvedIdentity) -> Result<Option<UserRecord>, AppError> {
        if let Some(id) = identity.user_id {
            if let Some(user) = self.users.find_by_id(id).await? {
                return Ok(Some(user));
            }
        }
        match identity.username.as_deref() {
            Some(username) => self.users.find_by_username(username).await,
            None => Ok(None),
        }
    }
}
