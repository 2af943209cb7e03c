use std::{sync::Arc, time::Duration};

use anyhow::Context;
use http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info};

use airpark_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    let clock: api::common::SharedClock = Arc::new(api::common::SystemClock);
    let integrations = api::integrations::Integrations::from_config(&cfg)?;

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        &cfg,
        clock.clone(),
        event_sender.clone(),
        integrations,
    );

    let auth_cfg = api::auth::AuthConfig::new(
        cfg.jwt_secret.clone(),
        cfg.auth_audience.clone(),
        cfg.auth_issuer.clone(),
        Duration::from_secs(cfg.jwt_expiration as u64),
        Duration::from_secs(cfg.refresh_token_expiration as u64),
    );
    let auth_service = Arc::new(api::auth::AuthService::new(
        auth_cfg,
        api::services::users::UserService::new(db_arc.clone(), clock.clone()),
    ));

    // Background jobs
    api::services::spot_holds::spawn_hold_sweeper(
        services.holds.clone(),
        Duration::from_secs(cfg.hold_sweep_interval_secs),
    );
    api::services::bookings::spawn_reminder_job(
        services.bookings.clone(),
        Duration::from_secs(cfg.reminder_interval_secs),
    );
    api::rate_limiter::spawn_cleanup_task(
        services.lookup_limiter.clone(),
        Duration::from_secs(cfg.lookup_rate_limit_window_secs.max(1) * 2),
    );

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        clock,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into());
    };

    let app = api::app_router(app_state, auth_service)
        .layer(cors_layer)
        .layer(TimeoutLayer::new(Duration::from_secs(
            cfg.request_timeout_secs,
        )));

    // Bind and serve
    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cfg.host, cfg.port))?;
    info!(
        "airpark-api listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
