//! CronJob trigger and suspend/resume (§4.8).

use chrono::Utc;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::ResourceExt;
use serde_json::json;

use super::permission::AccessRequest;
use super::ActionExecutor;
use crate::error::{CoreError, Result};

impl ActionExecutor {
    /// Creates a `batch/v1.Job` from the CronJob's `jobTemplate.spec`;
    /// returns the created job's name.
    pub async fn trigger_cronjob(
        &self,
        config_id: &str,
        cluster: &str,
        namespace: &str,
        name: &str,
    ) -> Result<String> {
        self.permissions
            .require(
                config_id,
                cluster,
                AccessRequest {
                    verb: "create",
                    group: "batch",
                    resource: "jobs",
                    subresource: None,
                    namespace: Some(namespace),
                    name: None,
                },
            )
            .await?;

        let client = self.client_factory.get(config_id, cluster).await?;
        let cronjobs: Api<CronJob> = Api::namespaced(client.clone(), namespace);
        let cronjob = cronjobs.get(name).await?;
        let job_spec = cronjob
            .spec
            .and_then(|s| s.job_template.spec)
            .ok_or_else(|| CoreError::Internal(format!("cronjob {name} has no job template spec")))?;

        let job_name = format!("{name}-manual-{}", Utc::now().format("%Y%m%d%H%M%S"));
        let job = Job {
            metadata: kube::api::ObjectMeta {
                name: Some(job_name.clone()),
                namespace: Some(namespace.to_string()),
                owner_references: Some(vec![cronjob.controller_owner_ref(&()).ok_or_else(|| {
                    CoreError::Internal("cronjob missing uid for owner reference".to_string())
                })?]),
                ..Default::default()
            },
            spec: Some(job_spec),
            status: None,
        };

        let jobs: Api<Job> = Api::namespaced(client, namespace);
        let created = jobs.create(&PostParams::default(), &job).await?;
        Ok(created.name_any())
    }

    /// PATCH `spec.suspend`.
    pub async fn set_cronjob_suspended(
        &self,
        config_id: &str,
        cluster: &str,
        namespace: &str,
        name: &str,
        suspended: bool,
    ) -> Result<()> {
        self.permissions
            .require(
                config_id,
                cluster,
                AccessRequest {
                    verb: "update",
                    group: "batch",
                    resource: "cronjobs",
                    subresource: None,
                    namespace: Some(namespace),
                    name: Some(name),
                },
            )
            .await?;

        let client = self.client_factory.get(config_id, cluster).await?;
        let api: Api<CronJob> = Api::namespaced(client, namespace);
        let patch = json!({ "spec": { "suspend": suspended } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
