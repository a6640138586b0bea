use std::sync::Arc;
use std::time::Duration;

use actix_web::error::Error as ActixError;
use actix_web::web::{Bytes, Data, Path, Query};
use actix_web::{HttpResponse, Responder};
use futures::stream;
use k8s_openapi::api::core::v1::Event as K8sEvent;
use kube::api::{Api, ListParams};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use super::ClusterAndNamespaceQuery;
use gateway_core::stream_id::StreamId;
use gateway_core::Gateway;

/// GetEvents (§4.7): lists `v1.Event` objects filtered by
/// `involvedObject.name` and re-publishes the same snapshot on a fixed 1s
/// tick for the lifetime of the request — the tick never re-fetches (§9
/// open question b), it only serves as a keep-alive.
pub async fn get_events(
    gateway: Data<Gateway>,
    path: Path<(String, String)>,
    query: Query<ClusterAndNamespaceQuery>,
) -> impl Responder {
    let (kind, name) = path.into_inner();
    let namespace = query.namespace.clone().unwrap_or_default();

    let client = match gateway.client_factory.get(&query.config, &query.cluster).await {
        Ok(c) => c,
        Err(e) => return crate::sse::error_frame(&e.to_envelope("events", "list")),
    };

    let api: Api<K8sEvent> = Api::namespaced(client, &namespace);
    let field_selector = format!("involvedObject.name={name},involvedObject.kind={kind}");
    let events = match api.list(&ListParams::default().fields(&field_selector)).await {
        Ok(list) => list.items,
        Err(e) => {
            warn!(config = %query.config, cluster = %query.cluster, kind, name, error = %e, "listing events failed");
            return crate::sse::error_frame(&gateway_core::CoreError::from(e).to_envelope("events", "list"));
        }
    };

    let payload = match serde_json::to_string(&json!({ "events": events })) {
        Ok(p) => p,
        Err(_) => "{\"events\":[]}".to_string(),
    };

    let stream_id = StreamId::events(&query.config, &query.cluster, &namespace, &name);
    gateway.broker.publish(&stream_id, "events", payload.clone());
    // Subscribing after publish() means replay-on-subscribe already delivers
    // this payload into the subscriber's pending slot once; the stream below
    // must not also emit it up front or the client sees it twice.
    let sub = gateway.broker.subscribe(&stream_id);

    stream_with_tick(sub, payload, gateway.settings.events_tick_interval)
}

struct TickState {
    sub: gateway_core::broker::Subscription,
    payload: String,
    tick: Duration,
    // A lock guarded around each tick even with no contender, matching the
    // original ticker's defensive style (§9 open question a); not a
    // concurrency contract, just retained behavior.
    tick_lock: Arc<AsyncMutex<()>>,
}

fn stream_with_tick(sub: gateway_core::broker::Subscription, initial_payload: String, tick: Duration) -> HttpResponse {
    let state = TickState {
        sub,
        payload: initial_payload,
        tick,
        tick_lock: Arc::new(AsyncMutex::new(())),
    };

    let body = stream::unfold(state, move |mut state| async move {
        tokio::select! {
            biased;
            next = state.sub.recv() => {
                match next {
                    Some(p) => {
                        let frame = format!("data: {p}\n\n");
                        Some((Ok::<Bytes, ActixError>(Bytes::from(frame)), state))
                    }
                    None => None,
                }
            }
            _ = tokio::time::sleep(state.tick) => {
                let _guard = state.tick_lock.lock().await;
                let frame = format!("data: {}\n\n", state.payload);
                drop(_guard);
                Some((Ok::<Bytes, ActixError>(Bytes::from(frame)), state))
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .append_header(("Cache-Control", "no-cache"))
        .streaming(body)
}
