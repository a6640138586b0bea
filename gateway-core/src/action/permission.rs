//! SubjectAccessReview pre-check (§4.8, §8 property 7): every mutating
//! action issues this before attempting the mutation, denial short-circuits
//! without ever reaching the API server's mutating endpoint.

use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use kube::api::{Api, PostParams};

use crate::client_factory::ClientFactory;
use crate::error::{CoreError, Result};

/// What is being attempted, for the `SelfSubjectAccessReview` request.
pub struct AccessRequest<'a> {
    pub verb: &'a str,
    pub group: &'a str,
    pub resource: &'a str,
    pub subresource: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// C8's permission pre-check, backed by C2's client cache.
#[derive(Clone)]
pub struct PermissionChecker {
    client_factory: ClientFactory,
}

impl PermissionChecker {
    pub fn new(client_factory: ClientFactory) -> Self {
        Self { client_factory }
    }

    /// Returns `Ok(())` if the review is allowed, `Err(PermissionDenied)`
    /// otherwise. Any failure talking to the API server is surfaced as-is;
    /// callers must not treat a review error as an implicit allow.
    pub async fn require(&self, config_id: &str, cluster: &str, req: AccessRequest<'_>) -> Result<()> {
        let client = self.client_factory.get(config_id, cluster).await?;
        let api: Api<SelfSubjectAccessReview> = Api::all(client);

        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    verb: Some(req.verb.to_string()),
                    group: Some(req.group.to_string()),
                    resource: Some(req.resource.to_string()),
                    subresource: req.subresource.map(str::to_string),
                    namespace: req.namespace.map(str::to_string),
                    name: req.name.map(str::to_string),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = api
            .create(&PostParams::default(), &review)
            .await
            .map_err(CoreError::from)?;

        let allowed = result.status.map(|s| s.allowed).unwrap_or(false);
        if allowed {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                verb: req.verb.to_string(),
                resource: req.resource.to_string(),
            })
        }
    }
}
