use actix_web::web::{Data, Path, Query};
use actix_web::Responder;
use gateway_core::stream_id::StreamId;
use gateway_core::Gateway;

use super::ClusterAndNamespaceQuery;
use crate::sse;

/// GetDetails (§4.7): publishes a first snapshot immediately, then streams
/// updates as the object changes.
pub async fn get_details(
    gateway: Data<Gateway>,
    path: Path<(String, String)>,
    query: Query<ClusterAndNamespaceQuery>,
) -> impl Responder {
    let (kind, name) = path.into_inner();

    if let Err(e) = gateway.informers.ensure_started(&query.config, &query.cluster, &kind).await {
        return sse::error_frame(&e.to_envelope(&kind, "get"));
    }

    let stream_id = StreamId::detail(&query.config, &query.cluster, &kind, query.namespace.as_deref(), &name);
    let sub = gateway.broker.subscribe(&stream_id);
    let _ = gateway.informers.publish_detail_snapshot(
        &query.config,
        &query.cluster,
        &kind,
        query.namespace.as_deref(),
        &name,
    );

    sse::stream_subscription(sub, gateway.settings.sse_keep_alive_interval)
}
