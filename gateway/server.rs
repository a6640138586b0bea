use actix_web::{middleware, web, web::Data, App, HttpServer};
use anyhow::Result;
use gateway_core::Gateway;

use crate::handlers::{action, config, delete, detail, events, health, list, metrics, permissions, yaml};

/// Configures and runs the actix-web server exposing the HTTP surface of §6.
pub async fn start_server(gateway: Gateway, listen_addr: String) -> Result<()> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(gateway.clone()))
            .wrap(middleware::Logger::default().exclude("/healthz"))
            .service(health::healthz)
            .service(metrics::metrics)
            .service(config::reload)
            .service(permissions::check)
            .service(
                web::resource("/api/v1/{kind}")
                    .route(web::get().to(list::get_list))
                    .route(web::delete().to(delete::delete_batch)),
            )
            .service(web::resource("/api/v1/{kind}/{name}").route(web::get().to(detail::get_details)))
            .service(web::resource("/api/v1/{kind}/{name}/yaml").route(web::get().to(yaml::get_yaml)))
            .service(web::resource("/api/v1/{kind}/{name}/events").route(web::get().to(events::get_events)))
            .service(
                web::resource("/api/v1/deployments/{name}/scale")
                    .route(web::patch().to(action::scale_deployment)),
            )
            .service(
                web::resource("/api/v1/deployments/{name}/restart")
                    .route(web::post().to(action::restart_deployment)),
            )
            .service(
                web::resource("/api/v1/cronjobs/{ns}/{name}/suspend")
                    .route(web::patch().to(action::suspend_cronjob)),
            )
            .service(
                web::resource("/api/v1/cronjobs/{ns}/{name}/trigger")
                    .route(web::post().to(action::trigger_cronjob)),
            )
    })
    .bind(listen_addr)?
    .shutdown_timeout(5);

    server.run().await?;
    Ok(())
}
