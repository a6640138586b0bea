//! Streams a [`gateway_core::broker::Subscription`] as `text/event-stream`
//! (§4.6, §6 "SSE frame format"), emitting a keep-alive comment at idle
//! intervals (§4.6 ServeSubscribe).

use std::time::Duration;

use actix_web::error::Error as ActixError;
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures::stream;
use gateway_core::broker::Subscription;

pub fn stream_subscription(sub: Subscription, keep_alive: Duration) -> HttpResponse {
    let body = stream::unfold((sub, keep_alive), move |(mut sub, keep_alive)| async move {
        tokio::select! {
            biased;
            payload = sub.recv() => {
                payload.map(|p| {
                    let frame = format!("data: {p}\n\n");
                    (Ok::<Bytes, ActixError>(Bytes::from(frame)), (sub, keep_alive))
                })
            }
            _ = tokio::time::sleep(keep_alive) => {
                Some((Ok::<Bytes, ActixError>(Bytes::from_static(b": keep-alive\n\n")), (sub, keep_alive)))
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .append_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

/// A single unrecoverable-error frame; the stream closes immediately after
/// (§4.7 "after an unrecoverable error the server SHOULD close the stream").
pub fn error_frame(envelope: &gateway_core::error::ErrorEnvelope) -> HttpResponse {
    let payload = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());
    let frame = format!("data: {payload}\n\n");
    let body = stream::once(async move { Ok::<Bytes, ActixError>(Bytes::from(frame)) });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .append_header(("Cache-Control", "no-cache"))
        .streaming(body)
}
