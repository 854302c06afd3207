//! Account lookups shared by the services, and the admin grant

use super::model::{Role, User};
use crate::config::EngineConfig;
use crate::core::error::{OrderError, OrderResult, StoreError, infra};
use crate::core::service::UserStore;
use crate::core::store::bounded;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const ACCOUNT_MISSING: &str =
    "looks like your account no longer exists. please contact support";
const GRANT_FORBIDDEN: &str = "you do not have the permission to add an admin";
const ALREADY_ADMIN: &str = "user already have access to admin feature";
const ACCOUNT_FAILED: &str = "we're having issues retrieving your account. please try again later";
const GRANT_FAILED: &str = "we're having issues adding user as admin. please try again later";

/// Resolve the acting user
///
/// A missing row becomes [`ACCOUNT_MISSING`]; any other failure becomes
/// `message`.
pub(crate) async fn resolve_user(
    users: &dyn UserStore,
    timeout: Duration,
    user_id: &str,
    operation: &'static str,
    message: &'static str,
) -> OrderResult<User> {
    match bounded(timeout, users.find_by_id(user_id)).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => {
            warn!(operation, user_id, "user does not exist");
            Err(OrderError::not_found(ACCOUNT_MISSING))
        }
        Err(err) => Err(infra(operation, "resolve_user", message)(err)),
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    config: EngineConfig,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Give `target_id` the admin role; the actor must already be an admin
    pub async fn grant_admin(&self, actor_id: &str, target_id: &str) -> OrderResult<User> {
        const OP: &str = "grant_admin";
        let timeout = self.config.query_timeout();

        let actor = resolve_user(self.users.as_ref(), timeout, actor_id, OP, ACCOUNT_FAILED).await?;
        if !actor.is_admin() {
            warn!(actor_id, "non-admin attempted to grant admin access");
            return Err(OrderError::permission(GRANT_FORBIDDEN));
        }

        let mut target =
            resolve_user(self.users.as_ref(), timeout, target_id, OP, GRANT_FAILED).await?;
        if target.is_admin() {
            return Err(OrderError::conflict(ALREADY_ADMIN));
        }

        match bounded(timeout, self.users.set_role(&target.id, Role::Admin)).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(OrderError::not_found(ACCOUNT_MISSING)),
            Err(err) => return Err(infra(OP, "set_role", GRANT_FAILED)(err)),
        }

        info!(actor_id, target_id, "admin access granted");
        target.role = Role::Admin;
        Ok(target)
    }
}
