//! Operational HTTP endpoints and process signals shared by the consumer binaries.

use crate::health::ConsumerErrorState;
use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

async fn ready(health: web::Data<ConsumerErrorState>) -> HttpResponse {
    let status = health.status();
    if status.healthy {
        HttpResponse::Ok().body("READY")
    } else {
        HttpResponse::ServiceUnavailable().body(format!(
            "NOT READY: {} consecutive errors, {}s since last success",
            status.consecutive_errors,
            status.time_since_last_success.as_secs()
        ))
    }
}

/// `/health`, `/ready` and `/metrics` on `0.0.0.0:port`
pub fn ops_server(port: u16, health: Arc<ConsumerErrorState>) -> std::io::Result<Server> {
    info!("Starting ops HTTP server on 0.0.0.0:{}", port);
    let health = web::Data::from(health);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(health.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/ready", web::get().to(ready))
            .route("/metrics", web::get().to(serve_metrics))
    })
    .workers(1)
    .disable_signals()
    .bind(("0.0.0.0", port))?
    .run();

    Ok(server)
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_ready_reports_unhealthy_consumer() {
        let health = Arc::new(ConsumerErrorState::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(health.clone()))
                .route("/ready", web::get().to(ready))
                .route("/metrics", web::get().to(serve_metrics)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
        assert!(resp.status().is_success());

        for _ in 0..20 {
            health.record_error();
        }
        let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert!(resp.status().is_success());
    }
}
