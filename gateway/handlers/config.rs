use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{get, HttpResponse, Responder};
use gateway_core::Gateway;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

/// Reload (§4.1): re-reads the backing config files, leaving the previous
/// snapshot in place on failure.
#[get("/api/v1/app/config/reload")]
pub async fn reload(gateway: Data<Gateway>) -> impl Responder {
    match gateway.reload_config() {
        Ok(()) => HttpResponse::Ok().json(Ack { ok: true }),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(e.to_envelope("config", "reload"))
        }
    }
}
