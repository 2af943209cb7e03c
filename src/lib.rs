//! Airpark API Library
//!
//! Backend for an airport parking operator: public lot availability and
//! quotes, checkout holds, bookings and payments for customers, the
//! check-in/check-out workflow for operators and back-office administration.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cache;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod integrations;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use utoipa::ToSchema;

use crate::auth::perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::rate_limiter::{rate_limit_middleware, RateLimiter};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub clock: common::SharedClock,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        assert!(!response.success);
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`. The flight and vehicle lookups share
/// `lookup_limiter`.
pub fn api_v1_routes(lookup_limiter: Arc<RateLimiter>) -> Router<AppState> {
    // Public customer flow
    let public = Router::new()
        .route("/lots", get(handlers::lots::list_lots))
        .route("/lots/:id", get(handlers::lots::get_lot))
        .route(
            "/lots/:id/availability",
            get(handlers::lots::lot_availability),
        )
        .route("/lots/:id/quote", get(handlers::lots::quote))
        .route("/services", get(handlers::lots::list_services))
        .route("/holds", post(handlers::spot_holds::reserve))
        .route(
            "/holds/current",
            get(handlers::spot_holds::current).delete(handlers::spot_holds::release),
        )
        .route(
            "/holds/current/extend",
            post(handlers::spot_holds::extend),
        )
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/lookup", post(handlers::bookings::lookup_booking))
        .route(
            "/bookings/:reference/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/bookings/:reference/checkout",
            post(handlers::bookings::start_checkout),
        );

    // Payment webhook (does not require auth, but signature-verified)
    let payment_webhook = Router::new().route(
        "/payments/webhook",
        post(handlers::payments::payment_webhook),
    );

    // Third-party lookups, rate limited per client IP
    let lookups = Router::new()
        .route("/flights/arrivals", get(handlers::flights::arrivals))
        .route("/flights/departures", get(handlers::flights::departures))
        .route("/flights/status", get(handlers::flights::status))
        .route("/vehicles/:plate", get(handlers::vehicles::lookup_vehicle))
        .layer(axum::middleware::from_fn_with_state(
            lookup_limiter,
            rate_limit_middleware,
        ));

    // Operator workflow
    let operator_read = Router::new()
        .route("/operator/bookings", get(handlers::operator::list_bookings))
        .route(
            "/operator/bookings/:id",
            get(handlers::operator::get_booking),
        )
        .route(
            "/operator/lots/:id/schedule",
            get(handlers::operator::daily_schedule),
        )
        .with_permission(perm::BOOKINGS_READ);

    let operator_write = Router::new()
        .route(
            "/operator/bookings/:id/status",
            put(handlers::operator::update_status),
        )
        .route(
            "/operator/bookings/:id/check-in",
            post(handlers::operator::check_in),
        )
        .route(
            "/operator/bookings/:id/check-out",
            post(handlers::operator::check_out),
        )
        .route(
            "/operator/bookings/:id/spot",
            put(handlers::operator::assign_spot),
        )
        .route(
            "/operator/bookings/:id/addons/:addon_id",
            put(handlers::operator::update_addon),
        )
        .route(
            "/operator/reminders/run",
            post(handlers::operator::run_reminders),
        )
        .with_permission(perm::BOOKINGS_OPERATE);

    // Back office
    let admin_lots = Router::new()
        .route(
            "/admin/lots",
            get(handlers::admin::list_lots).post(handlers::admin::create_lot),
        )
        .route(
            "/admin/lots/:id",
            get(handlers::admin::get_lot)
                .put(handlers::admin::update_lot)
                .delete(handlers::admin::delete_lot),
        )
        .with_permission(perm::LOTS_MANAGE);

    let admin_pricing = Router::new()
        .route(
            "/admin/lots/:id/pricing",
            get(handlers::admin::list_pricing).put(handlers::admin::upsert_pricing),
        )
        .with_permission(perm::PRICING_MANAGE);

    let admin_services = Router::new()
        .route(
            "/admin/services",
            get(handlers::admin::list_services).post(handlers::admin::create_service),
        )
        .route(
            "/admin/services/:id",
            put(handlers::admin::update_service),
        )
        .with_permission(perm::SERVICES_MANAGE);

    let admin_refunds = Router::new()
        .route(
            "/admin/payments/:id/refund",
            post(handlers::admin::refund_payment),
        )
        .with_permission(perm::PAYMENTS_REFUND);

    let admin_users = Router::new()
        .route(
            "/admin/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route("/admin/users/:id", put(handlers::admin::update_user))
        .with_permission(perm::USERS_MANAGE);

    let admin_holds = Router::new()
        .route("/admin/holds/purge", post(handlers::admin::purge_holds))
        .with_permission(perm::HOLDS_MANAGE);

    Router::new()
        // Status endpoint
        .route("/status", get(health::api_status))
        .merge(public)
        .merge(payment_webhook)
        .merge(lookups)
        .merge(operator_read)
        .merge(operator_write)
        .merge(admin_lots)
        .merge(admin_pricing)
        .merge(admin_services)
        .merge(admin_refunds)
        .merge(admin_users)
        .merge(admin_holds)
}

/// The full HTTP application minus the deployment-specific CORS and timeout
/// layers: health, `/api/v1`, `/auth` and the Swagger UI.
pub fn app_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    let lookup_limiter = state.services.lookup_limiter.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "airpark-api up" }))
        .nest("/health", health::health_routes())
        .nest("/api/v1", api_v1_routes(lookup_limiter))
        .nest(
            "/auth",
            auth::auth_routes().with_state(auth_service.clone()),
        )
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
