use actix_web::web::{Data, Path, Query};
use actix_web::Responder;
use gateway_core::stream_id::StreamId;
use gateway_core::Gateway;

use super::ClusterAndFlashQuery;
use crate::sse;

/// GetList (§4.7): ensures the informer is started, subscribes to the list
/// stream, and schedules an immediate snapshot so the caller doesn't wait
/// for the next watch event.
pub async fn get_list(
    gateway: Data<Gateway>,
    path: Path<String>,
    query: Query<ClusterAndFlashQuery>,
) -> impl Responder {
    let kind = path.into_inner();

    if let Err(e) = gateway.informers.ensure_started(&query.config, &query.cluster, &kind).await {
        return sse::error_frame(&e.to_envelope(&kind, "list"));
    }

    let stream_id = StreamId::list(&query.config, &query.cluster, &kind);
    let sub = gateway.broker.subscribe(&stream_id);
    let _ = gateway
        .informers
        .publish_list_snapshot(&query.config, &query.cluster, &kind, query.resourcename.as_deref());

    sse::stream_subscription(sub, gateway.settings.sse_keep_alive_interval)
}
