#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use airpark_api::{
    auth::{AuthConfig, AuthService},
    common::{ManualClock, SharedClock},
    config::AppConfig,
    db,
    entities::{lot, service_offering, UserRole, VehicleType},
    events::{self, EventSender},
    handlers::AppServices,
    integrations::{email::LogEmailSender, Integrations},
    services::{
        catalog::CreateServiceOfferingRequest,
        lots::CreateLotRequest,
        payments::sign_webhook,
        pricing::UpsertPricingRequest,
        users::{CreateUserRequest, UserService},
    },
    AppState,
};
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration_tests";
pub const ADMIN_EMAIL: &str = "admin@airpark.test";
pub const ADMIN_PASSWORD: &str = "Sup3rSecretPass";

/// The instant every test starts at
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, 20, 9, 0, 0).unwrap()
}

/// Application wired against a throwaway SQLite file and a manual clock.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub outbox: LogEmailSender,
    pub auth_service: Arc<AuthService>,
    admin_token: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("airpark_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "integration_test_secret_with_enough_entropy_0123456789_qwertyuiop_zxcv".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let clock = Arc::new(ManualClock::new(test_start()));
        let shared_clock: SharedClock = clock.clone();

        let outbox = LogEmailSender::new();
        let mut integrations = if cfg.payment_gateway_url.is_some() {
            Integrations::from_config(&cfg).expect("integrations for test config")
        } else {
            Integrations::offline()
        };
        integrations.email = Arc::new(outbox.clone());

        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            shared_clock.clone(),
            event_sender.clone(),
            integrations,
        );

        let users = UserService::new(db_arc.clone(), shared_clock.clone());
        let auth_service = Arc::new(AuthService::new(
            AuthConfig::new(
                cfg.jwt_secret.clone(),
                cfg.auth_audience.clone(),
                cfg.auth_issuer.clone(),
                Duration::from_secs(cfg.jwt_expiration as u64),
                Duration::from_secs(cfg.refresh_token_expiration as u64),
            ),
            users.clone(),
        ));

        let admin = users
            .create(CreateUserRequest {
                email: ADMIN_EMAIL.to_string(),
                name: "Test Admin".to_string(),
                password: ADMIN_PASSWORD.to_string(),
                role: UserRole::Admin,
            })
            .await
            .expect("create admin user");
        let admin_model = users.find(admin.id).await.expect("load admin user");
        let admin_token = auth_service
            .generate_token(&admin_model)
            .expect("issue admin token")
            .access_token;

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            clock: shared_clock,
            services,
        };
        let router = airpark_api::app_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            clock,
            outbox,
            auth_service,
            admin_token,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Creates an operator account and returns a bearer token for it.
    pub async fn operator_token(&self, email: &str) -> String {
        let users = &self.state.services.users;
        let created = users
            .create(CreateUserRequest {
                email: email.to_string(),
                name: "Test Operator".to_string(),
                password: "Operat0rPassword".to_string(),
                role: UserRole::Operator,
            })
            .await
            .expect("create operator");
        let model = users.find(created.id).await.expect("load operator");
        self.auth_service
            .generate_token(&model)
            .expect("issue operator token")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request carrying a checkout session header
    pub async fn session_request(
        &self,
        method: Method,
        uri: &str,
        session: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, None, &[("x-session-id", session)])
            .await
    }

    pub async fn admin_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.admin_token())).await
    }

    /// Posts a signed gateway webhook.
    pub async fn send_webhook(&self, payload: Value) -> axum::response::Response {
        let body = serde_json::to_vec(&payload).expect("serialize webhook");
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_webhook(WEBHOOK_SECRET, &timestamp, &body).expect("sign webhook");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("x-timestamp", timestamp)
            .header("x-signature", signature)
            .body(Body::from(body))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook")
    }

    /// An active lot with medium-vehicle pricing at `price_per_day`.
    pub async fn seed_lot(&self, code: &str, total_spaces: i32, price_per_day: i64) -> lot::Model {
        let lot = self
            .state
            .services
            .lots
            .create(CreateLotRequest {
                code: code.to_string(),
                name: format!("Lot {}", code),
                names: None,
                address: Some("Reykjanesbraut 1".to_string()),
                total_spaces,
                is_active: Some(true),
            })
            .await
            .expect("seed lot");

        self.state
            .services
            .pricing
            .upsert(
                lot.id,
                UpsertPricingRequest {
                    vehicle_type: VehicleType::Medium,
                    price_per_day,
                    weekly_discount_percent: Some(Decimal::new(10, 0)),
                    monthly_discount_percent: Some(Decimal::new(20, 0)),
                },
            )
            .await
            .expect("seed pricing");

        lot
    }

    pub async fn seed_service(&self, name: &str, price: i64) -> service_offering::Model {
        self.state
            .services
            .catalog
            .create(CreateServiceOfferingRequest {
                name: name.to_string(),
                description: None,
                price,
                is_active: Some(true),
                sort_order: None,
            })
            .await
            .expect("seed service offering")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Body for `POST /api/v1/bookings` on the medium tier
pub fn booking_body(
    lot_id: Uuid,
    drop_off: DateTime<Utc>,
    pick_up: DateTime<Utc>,
    email: &str,
) -> Value {
    serde_json::json!({
        "lot_id": lot_id,
        "vehicle_type": "medium",
        "license_plate": "ab-123",
        "customer_name": "Test Customer",
        "customer_email": email,
        "drop_off_time": drop_off.to_rfc3339(),
        "pick_up_time": pick_up.to_rfc3339(),
    })
}
