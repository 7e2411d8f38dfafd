use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use blog_service::config::Config;
use blog_service::logging::init_tracing;
use blog_service::schema::build_schema;
use blog_service::{build_service, handlers};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.env);

    info!(
        env = ?config.app.env,
        storage = %config.storage.kind,
        workers = config.app.workers,
        "Starting blog-service"
    );

    let (cancel_handle, cancel_signal) = resilience::cancel_pair();

    let service = build_service(&config, cancel_signal)
        .await
        .context("Failed to initialize storage")?;
    let schema = build_schema(service, &config.graphql);

    let bind_addr = config.bind_addr();
    info!("Listening on http://{}", bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(schema.clone()))
            .configure(handlers::configure)
    })
    .workers(config.app.workers)
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {bind_addr}"))?
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        // Stop starting new storage attempts before draining connections
        cancel_handle.cancel();
        server_handle.stop(true).await;
    });

    server.await.context("HTTP server error")?;
    info!("blog-service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
