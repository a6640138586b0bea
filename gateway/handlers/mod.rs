//! C7: Handler Template — thin actix-web adapters over `gateway-core`.
//! Every non-app endpoint requires `config` and `cluster` query parameters
//! (§6).

pub mod action;
pub mod config;
pub mod delete;
pub mod detail;
pub mod events;
pub mod health;
pub mod list;
pub mod metrics;
pub mod permissions;
pub mod yaml;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub config: String,
    pub cluster: String,
}

#[derive(Debug, Deserialize)]
pub struct ClusterAndNamespaceQuery {
    pub config: String,
    pub cluster: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterAndFlashQuery {
    pub config: String,
    pub cluster: String,
    /// Resource name whose list row should be flashed as just-updated (§4.7).
    pub resourcename: Option<String>,
}
