//! Restart (§4.8): Deployments, DaemonSets, StatefulSets. `rolling` stamps a
//! new `kubectl.kubernetes.io/restartedAt` annotation on the pod template;
//! `recreate` scales to zero and back to the prior replica count in two
//! operations.

use chrono::Utc;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use serde_json::json;
use tracing::warn;

use super::permission::AccessRequest;
use super::{ActionExecutor, RestartStrategy};
use crate::error::{CoreError, Result};

impl ActionExecutor {
    pub async fn restart(
        &self,
        config_id: &str,
        cluster: &str,
        kind: &str,
        namespace: &str,
        name: &str,
        strategy: RestartStrategy,
    ) -> Result<()> {
        let descriptor = self
            .discovery
            .find_resource_by_kind(config_id, cluster, kind)
            .await?;

        self.permissions
            .require(
                config_id,
                cluster,
                AccessRequest {
                    verb: "update",
                    group: &descriptor.group,
                    resource: &descriptor.plural,
                    subresource: None,
                    namespace: Some(namespace),
                    name: Some(name),
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
        let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &ar);

        match strategy {
            RestartStrategy::Rolling => {
                let timestamp = Utc::now().to_rfc3339();
                let patch = json!({
                    "spec": {
                        "template": {
                            "metadata": {
                                "annotations": {
                                    "kubectl.kubernetes.io/restartedAt": timestamp
                                }
                            }
                        }
                    }
                });
                api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
                    .await?;
            }
            RestartStrategy::Recreate => {
                let current = api.get(name).await?;
                let replicas = current
                    .data
                    .get("spec")
                    .and_then(|s| s.get("replicas"))
                    .and_then(|r| r.as_i64())
                    .ok_or_else(|| {
                        CoreError::Internal(format!(
                            "{kind} has no spec.replicas, recreate restart is not supported"
                        ))
                    })?;

                api.patch(
                    name,
                    &PatchParams::default(),
                    &Patch::Merge(json!({ "spec": { "replicas": 0 } })),
                )
                .await?;
                if let Err(e) = api
                    .patch(
                        name,
                        &PatchParams::default(),
                        &Patch::Merge(json!({ "spec": { "replicas": replicas } })),
                    )
                    .await
                {
                    warn!(config_id, cluster, kind, name, error = %e, "restoring replica count after recreate failed");
                    return Err(CoreError::from(e));
                }
            }
        }
        Ok(())
    }
}
