use actix_web::http::StatusCode;
use actix_web::web::{Data, Json};
use actix_web::{post, HttpResponse, Responder};
use gateway_core::Gateway;
use serde::{Deserialize, Serialize};

use gateway_core::action::permission::AccessRequest;

/// A client-facing SubjectAccessReview probe, so the UI can grey out actions
/// the caller isn't permitted to take (§3 supplemented feature).
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub config: String,
    pub cluster: String,
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub subresource: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    allowed: bool,
}

#[post("/api/v1/permissions/check")]
pub async fn check(gateway: Data<Gateway>, body: Json<CheckRequest>) -> impl Responder {
    let req = body.into_inner();
    let result = gateway
        .actions
        .check_permission(
            &req.config,
            &req.cluster,
            AccessRequest {
                verb: &req.verb,
                group: &req.group,
                resource: &req.resource,
                subresource: req.subresource.as_deref(),
                namespace: req.namespace.as_deref(),
                name: req.name.as_deref(),
            },
        )
        .await;

    match result {
        Ok(()) => HttpResponse::Ok().json(CheckResponse { allowed: true }),
        Err(gateway_core::CoreError::PermissionDenied { .. }) => {
            HttpResponse::Ok().json(CheckResponse { allowed: false })
        }
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(e.to_envelope(&req.resource, &req.verb))
        }
    }
}
