use actix_web::{get, HttpRequest, HttpResponse, Responder};

/// Liveness endpoint, excluded from access logging (§3 ambient supplement).
#[get("/healthz")]
pub async fn healthz(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}
