/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - pings the database
 * - Liveness check (`/health/live`) - the process is serving requests
 * - Readiness check (`/health/ready`) - database reachable and migrations applied
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error};

use crate::{db, migrator::Migrator, AppState};

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthDetail {
    fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            message: None,
            timestamp: Utc::now(),
        }
    }

    fn down(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn uptime_seconds() -> u64 {
    STARTED_AT.elapsed().as_secs()
}

async fn database_detail(state: &AppState) -> HealthDetail {
    match db::check_connection(&state.db).await {
        Ok(()) => HealthDetail::up(),
        Err(e) => {
            error!("Database health check failed: {}", e);
            HealthDetail::down("database unreachable")
        }
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check endpoint called");
    let database = database_detail(&state).await;

    (
        status_code(database.status),
        Json(json!({
            "status": database.status,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now(),
            "database": database,
        })),
    )
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": uptime_seconds(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = database_detail(&state).await;
    let migrations = if database.status == HealthStatus::Up {
        match Migrator::get_pending_migrations(&*state.db).await {
            Ok(pending) if pending.is_empty() => HealthDetail::up(),
            Ok(pending) => HealthDetail::down(format!("{} pending migrations", pending.len())),
            Err(e) => {
                error!("Migration status check failed: {}", e);
                HealthDetail::down("migration status unknown")
            }
        }
    } else {
        HealthDetail::down("database unreachable")
    };

    let ready = database.status == HealthStatus::Up && migrations.status == HealthStatus::Up;
    let status = if ready { HealthStatus::Up } else { HealthStatus::Down };

    (
        status_code(status),
        Json(json!({
            "ready": ready,
            "timestamp": Utc::now(),
            "details": {
                "database": database,
                "migrations": migrations,
            },
        })),
    )
}

/// Creates router with health check endpoints
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
}

/// Build and runtime information for `/api/v1/status`
pub async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "airpark-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "uptime_seconds": uptime_seconds(),
        "currency": state.config.currency,
        "spot_hold_backend": state.config.spot_hold_backend,
        "spot_hold_ttl_secs": state.config.spot_hold_ttl_secs,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
