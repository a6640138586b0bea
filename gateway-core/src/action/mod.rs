//! C8: Action Executor.
//!
//! Every mutating verb goes through the permission pre-check in
//! [`permission`] before touching the API server (§4.8, §8 property 7), then
//! iterates its batch with per-item failure reporting (§8 property 6).

pub mod cronjob;
pub mod delete;
pub mod permission;
pub mod restart;
pub mod scale;

use serde::Serialize;

use crate::client_factory::ClientFactory;
use crate::discovery::DiscoveryCache;
use crate::error::Result;
use permission::{AccessRequest, PermissionChecker};

/// One `{namespace?, name}` batch member.
#[derive(Debug, Clone)]
pub struct ActionTarget {
    pub namespace: Option<String>,
    pub name: String,
}

/// One failed batch member, returned alongside `200 OK` (§8 property 6).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionFailure {
    pub namespace: Option<String>,
    pub name: String,
    pub message: String,
}

/// `rolling` writes a restart annotation; `recreate` scales to zero and back
/// (§4.8 Restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategy {
    Rolling,
    Recreate,
}

/// C8. Cheaply cloneable; composes the other core collaborators rather than
/// owning any state of its own.
#[derive(Clone)]
pub struct ActionExecutor {
    pub(crate) client_factory: ClientFactory,
    pub(crate) discovery: DiscoveryCache,
    pub(crate) permissions: PermissionChecker,
}

impl ActionExecutor {
    pub fn new(client_factory: ClientFactory, discovery: DiscoveryCache) -> Self {
        Self {
            permissions: PermissionChecker::new(client_factory.clone()),
            client_factory,
            discovery,
        }
    }

    /// Exposes the permission pre-check directly, for callers (e.g. a UI
    /// probe endpoint) that only want to know whether an action would be
    /// allowed without attempting it.
    pub async fn check_permission(&self, config_id: &str, cluster: &str, req: AccessRequest<'_>) -> Result<()> {
        self.permissions.require(config_id, cluster, req).await
    }
}
