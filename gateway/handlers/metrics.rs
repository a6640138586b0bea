use actix_web::{get, HttpRequest, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};

/// `/metrics` Prometheus exposition, reading the process-wide default registry.
#[get("/metrics")]
pub async fn metrics(_: HttpRequest) -> impl Responder {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&families, &mut buffer).unwrap();
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
