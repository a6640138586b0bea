use actix_web::web::{Data, Json, Path, Query};
use actix_web::{HttpResponse, Responder};
use gateway_core::action::ActionTarget;
use gateway_core::Gateway;
use serde::{Deserialize, Serialize};

use super::ClusterQuery;

#[derive(Debug, Deserialize)]
pub struct DeleteTargetBody {
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    failures: Vec<gateway_core::action::ActionFailure>,
}

/// Delete (§4.7, §8 property 6 / scenario S4): a partial failure is data,
/// not an HTTP error.
pub async fn delete_batch(
    gateway: Data<Gateway>,
    path: Path<String>,
    query: Query<ClusterQuery>,
    body: Json<Vec<DeleteTargetBody>>,
) -> impl Responder {
    let kind = path.into_inner();
    let targets: Vec<ActionTarget> = body
        .into_inner()
        .into_iter()
        .map(|t| ActionTarget {
            namespace: t.namespace,
            name: t.name,
        })
        .collect();

    match gateway.actions.delete(&query.config, &query.cluster, &kind, targets).await {
        Ok(failures) => {
            if !failures.is_empty() {
                gateway
                    .metrics
                    .action_failures
                    .with_label_values(&["delete"])
                    .inc_by(failures.len() as u64);
            }
            HttpResponse::Ok().json(DeleteResponse { failures })
        }
        Err(e) => {
            gateway.metrics.action_failures.with_label_values(&["delete"]).inc();
            HttpResponse::build(
                actix_web::http::StatusCode::from_u16(e.status_code()).unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            )
            .json(e.to_envelope(&kind, "delete"))
        }
    }
}
