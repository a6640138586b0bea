use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{HttpResponse, Responder};
use gateway_core::action::RestartStrategy;
use gateway_core::{CoreError, Gateway};
use serde::{Deserialize, Serialize};

use super::ClusterAndNamespaceQuery;

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    #[serde(rename = "replicaCount")]
    pub replica_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RestartRequest {
    pub strategy: String,
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

fn err_response(gateway: &Gateway, e: CoreError, resource: &str, verb: &str) -> HttpResponse {
    gateway.metrics.action_failures.with_label_values(&[verb]).inc();
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(e.to_envelope(resource, verb))
}

/// PATCH `/api/v1/deployments/{name}/scale` (§4.8, §8 property 7).
pub async fn scale_deployment(
    gateway: Data<Gateway>,
    path: Path<String>,
    query: Query<ClusterAndNamespaceQuery>,
    body: Json<ScaleRequest>,
) -> impl Responder {
    let name = path.into_inner();
    let namespace = query.namespace.clone().unwrap_or_default();

    match gateway
        .actions
        .scale_deployment(&query.config, &query.cluster, &namespace, &name, body.replica_count)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(Ack { ok: true }),
        Err(e) => err_response(&gateway, e, "deployments", "update"),
    }
}

/// POST `/api/v1/deployments/{name}/restart` (§4.8).
pub async fn restart_deployment(
    gateway: Data<Gateway>,
    path: Path<String>,
    query: Query<ClusterAndNamespaceQuery>,
    body: Json<RestartRequest>,
) -> impl Responder {
    let name = path.into_inner();
    let namespace = query.namespace.clone().unwrap_or_default();

    let strategy = match body.strategy.as_str() {
        "recreate" => RestartStrategy::Recreate,
        _ => RestartStrategy::Rolling,
    };

    match gateway
        .actions
        .restart(&query.config, &query.cluster, "Deployment", &namespace, &name, strategy)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(Ack { ok: true }),
        Err(e) => err_response(&gateway, e, "deployments", "update"),
    }
}

/// PATCH `/api/v1/cronjobs/{ns}/{name}/suspend` (§4.8).
pub async fn suspend_cronjob(
    gateway: Data<Gateway>,
    path: Path<(String, String)>,
    query: Query<super::ClusterQuery>,
    body: Json<SuspendRequest>,
) -> impl Responder {
    let (namespace, name) = path.into_inner();

    match gateway
        .actions
        .set_cronjob_suspended(&query.config, &query.cluster, &namespace, &name, body.suspend)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(Ack { ok: true }),
        Err(e) => err_response(&gateway, e, "cronjobs", "update"),
    }
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub suspend: bool,
}

/// POST `/api/v1/cronjobs/{ns}/{name}/trigger` (§4.8).
pub async fn trigger_cronjob(
    gateway: Data<Gateway>,
    path: Path<(String, String)>,
    query: Query<super::ClusterQuery>,
) -> impl Responder {
    let (namespace, name) = path.into_inner();

    match gateway
        .actions
        .trigger_cronjob(&query.config, &query.cluster, &namespace, &name)
        .await
    {
        Ok(job_name) => HttpResponse::Ok().json(serde_json::json!({ "jobName": job_name })),
        Err(e) => err_response(&gateway, e, "jobs", "create"),
    }
}
