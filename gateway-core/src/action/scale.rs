//! Scale (§4.8): PATCH the `scale` subresource to the requested replica
//! count, clamped to a non-negative `i32`.

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;

use super::permission::AccessRequest;
use super::ActionExecutor;
use crate::error::Result;

impl ActionExecutor {
    /// Scales a Deployment to `replicas` (clamped to `[0, i32::MAX]`).
    pub async fn scale_deployment(
        &self,
        config_id: &str,
        cluster: &str,
        namespace: &str,
        name: &str,
        replicas: i64,
    ) -> Result<()> {
        self.permissions
            .require(
                config_id,
                cluster,
                AccessRequest {
                    verb: "update",
                    group: "apps",
                    resource: "deployments",
                    subresource: Some("scale"),
                    namespace: Some(namespace),
                    name: Some(name),
                },
            )
            .await?;

        let clamped = replicas.clamp(0, i32::MAX as i64) as i32;
        let client = self.client_factory.get(config_id, cluster).await?;
        let api: Api<Deployment> = Api::namespaced(client, namespace);

        let patch = json!({ "spec": { "replicas": clamped } });
        api.patch_scale(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
