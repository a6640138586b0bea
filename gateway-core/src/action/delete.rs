//! Delete (§4.8, §8 property 6 / scenario S4).

use kube::api::{Api, ApiResource, DeleteParams, DynamicObject};
use tracing::warn;

use super::permission::AccessRequest;
use super::{ActionExecutor, ActionFailure, ActionTarget};
use crate::error::Result;

impl ActionExecutor {
    /// Deletes every target, namespace-aware per C3, and returns the
    /// per-item failures. A missing object is reported as a failure, not
    /// propagated as an error — the batch as a whole always succeeds at the
    /// HTTP layer (§4.7 "a partial failure is not an HTTP error").
    pub async fn delete(
        &self,
        config_id: &str,
        cluster: &str,
        kind: &str,
        targets: Vec<ActionTarget>,
    ) -> Result<Vec<ActionFailure>> {
        let descriptor = self
            .discovery
            .find_resource_by_kind(config_id, cluster, kind)
            .await?;

        self.permissions
            .require(
                config_id,
                cluster,
                AccessRequest {
                    verb: "delete",
                    group: &descriptor.group,
                    resource: &descriptor.plural,
                    subresource: None,
                    namespace: None,
                    name: None,
                },
            )
            .await?;

        let client = self.client_factory.get(config_id, cluster).await?;
        let ar = ApiResource {
            group: descriptor.group.clone(),
            version: descriptor.version.clone(),
            api_version: if descriptor.group.is_empty() {
                descriptor.version.clone()
            } else {
                format!("{}/{}", descriptor.group, descriptor.version)
            },
            kind: descriptor.kind.clone(),
            plural: descriptor.plural.clone(),
        };

        let mut failures = Vec::new();
        for target in targets {
            let api: Api<DynamicObject> = match (&target.namespace, descriptor.namespaced) {
                (Some(ns), true) => Api::namespaced_with(client.clone(), ns, &ar),
                _ => Api::all_with(client.clone(), &ar),
            };
            if let Err(e) = api.delete(&target.name, &DeleteParams::default()).await {
                warn!(
                    config_id,
                    cluster,
                    kind,
                    name = %target.name,
                    error = %e,
                    "delete failed"
                );
                failures.push(ActionFailure {
                    namespace: target.namespace,
                    name: target.name,
                    message: e.to_string(),
                });
            }
        }
        Ok(failures)
    }
}
