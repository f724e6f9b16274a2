use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use stream_lifecycle_service::app_state::AppState;
use stream_lifecycle_service::config::Config;
use stream_lifecycle_service::routes::configure_routes;
use stream_lifecycle_service::services::streaming::{
    AdmissionController, DeliveryInitializer, HealthRegistry, HealthSweeper,
    HttpDeliveryInitializer, InMemoryStreamRepository, LoggingDelivery, NotificationSink,
    RecordingFinalizer, SharedClock, StreamCoordinator, StreamRepository, StreamSettings,
    SystemClock, TracingNotificationSink, WebhookNotificationSink,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stream_lifecycle_service=debug")),
        )
        .init();

    let config = Arc::new(Config::from_env());
    info!(env = %config.app.env, "starting stream-lifecycle-service");

    let clock: SharedClock = Arc::new(SystemClock);
    let repo: Arc<dyn StreamRepository> = Arc::new(InMemoryStreamRepository::new());

    let (delivery, recorder): (Arc<dyn DeliveryInitializer>, Arc<dyn RecordingFinalizer>) =
        match &config.integrations.delivery_base_url {
            Some(url) => {
                info!(%url, "using HTTP delivery pipeline");
                let http = Arc::new(HttpDeliveryInitializer::new(url.clone()));
                (http.clone(), http)
            }
            None => {
                info!("no delivery pipeline configured; using logging stub");
                let stub = Arc::new(LoggingDelivery);
                (stub.clone(), stub)
            }
        };

    let sink: Arc<dyn NotificationSink> = match &config.integrations.notification_webhook_url {
        Some(url) => {
            info!(%url, "publishing lifecycle events to webhook");
            Arc::new(WebhookNotificationSink::new(url.clone()))
        }
        None => Arc::new(TracingNotificationSink),
    };

    let registry = Arc::new(HealthRegistry::new(clock.clone()));
    let admission = AdmissionController::new(
        repo.clone(),
        config.limits.max_active_streams_per_owner,
    );
    let coordinator = Arc::new(StreamCoordinator::new(
        repo,
        admission,
        registry,
        delivery,
        recorder,
        sink,
        clock.clone(),
        StreamSettings::default(),
    ));

    // Health sweeper: reaps streams whose ingest went silent
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper = HealthSweeper::new(
        coordinator.clone(),
        clock,
        Duration::from_secs(config.sweeper.period_secs),
        config.sweeper.heartbeat_timeout_secs,
    );
    let sweeper_handle = sweeper.spawn(shutdown_tx.subscribe());
    info!(
        period_secs = config.sweeper.period_secs,
        timeout_secs = config.sweeper.heartbeat_timeout_secs,
        "health sweeper spawned"
    );

    let state = AppState {
        coordinator,
        config: config.clone(),
    };

    let bind_addr = (config.app.host.clone(), config.app.port);
    info!(host = %config.app.host, port = config.app.port, "binding HTTP server");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    let result = server.await;

    // Stop the sweeper cleanly before exiting
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await {
        Ok(Ok(())) => info!("health sweeper shut down gracefully"),
        Ok(Err(_)) => info!("health sweeper aborted"),
        Err(_) => tracing::warn!("health sweeper did not shut down within timeout"),
    }

    result
}
