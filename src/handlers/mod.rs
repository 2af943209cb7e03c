pub mod admin;
pub mod bookings;
pub mod common;
pub mod flights;
pub mod lots;
pub mod operator;
pub mod payments;
pub mod spot_holds;
pub mod vehicles;

use crate::{
    common::SharedClock,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    integrations::Integrations,
    rate_limiter::{RateLimitConfig, RateLimiter},
    services::{
        addons::AddonService,
        availability::AvailabilityService,
        booking_lifecycle::BookingLifecycle,
        bookings::{BookingService, BookingSettings},
        catalog::CatalogService,
        flights::FlightService,
        lots::LotService,
        notifications::NotificationService,
        payments::{PaymentService, PaymentSettings},
        pricing::PricingService,
        spot_holds::{DatabaseSpotHoldStore, HoldSettings, InMemorySpotHoldStore, SpotHoldStore},
        users::UserService,
        vehicles::VehicleService,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub availability: Arc<AvailabilityService>,
    pub pricing: Arc<PricingService>,
    pub holds: Arc<dyn SpotHoldStore>,
    pub bookings: Arc<BookingService>,
    pub addons: Arc<AddonService>,
    pub lots: Arc<LotService>,
    pub catalog: Arc<CatalogService>,
    pub payments: Arc<PaymentService>,
    pub flights: Arc<FlightService>,
    pub vehicles: Arc<VehicleService>,
    pub users: Arc<UserService>,
    /// Shared by the flight and vehicle lookup routes
    pub lookup_limiter: Arc<RateLimiter>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        clock: SharedClock,
        event_sender: Arc<EventSender>,
        integrations: Integrations,
    ) -> Self {
        let hold_settings = HoldSettings::from_secs(config.spot_hold_ttl_secs);
        let holds: Arc<dyn SpotHoldStore> = if config.uses_in_memory_holds() {
            warn!("In-memory spot holds only coordinate checkouts within this process");
            Arc::new(InMemorySpotHoldStore::new(
                db_pool.clone(),
                clock.clone(),
                hold_settings,
                Some(event_sender.clone()),
            ))
        } else {
            Arc::new(DatabaseSpotHoldStore::new(
                db_pool.clone(),
                clock.clone(),
                hold_settings,
                Some(event_sender.clone()),
            ))
        };

        let lifecycle = BookingLifecycle::new(clock.clone());
        let notifications = NotificationService::new(integrations.email.clone());

        let payments = Arc::new(PaymentService::new(
            db_pool.clone(),
            integrations.payment_gateway.clone(),
            lifecycle.clone(),
            event_sender.clone(),
            clock.clone(),
            PaymentSettings {
                currency: config.currency.clone(),
                return_url: config.payment_return_url.clone(),
                webhook_secret: config.payment_webhook_secret.clone(),
                webhook_tolerance_secs: config.payment_webhook_tolerance_secs,
            },
        ));

        let bookings = Arc::new(BookingService::new(
            db_pool.clone(),
            clock.clone(),
            lifecycle.clone(),
            holds.clone(),
            payments.clone(),
            notifications,
            event_sender.clone(),
            BookingSettings {
                currency: config.currency.clone(),
                reminder_lead: chrono::Duration::hours(config.reminder_lead_hours),
                default_page_size: config.api_default_page_size,
                max_page_size: config.api_max_page_size,
            },
        ));

        let lookup_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            requests_per_window: config.lookup_rate_limit_requests,
            window_duration: Duration::from_secs(config.lookup_rate_limit_window_secs),
        }));

        Self {
            availability: Arc::new(AvailabilityService::new(
                db_pool.clone(),
                clock.clone(),
                holds.clone(),
            )),
            pricing: Arc::new(PricingService::new(db_pool.clone())),
            holds,
            bookings,
            addons: Arc::new(AddonService::new(
                db_pool.clone(),
                clock.clone(),
                lifecycle,
                event_sender,
            )),
            lots: Arc::new(LotService::new(db_pool.clone(), clock.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone(), clock.clone())),
            payments,
            flights: Arc::new(FlightService::new(
                integrations.flight_data,
                Duration::from_secs(config.flight_cache_ttl_secs),
            )),
            vehicles: Arc::new(VehicleService::new(
                integrations.vehicle_registry,
                Duration::from_secs(config.vehicle_cache_ttl_secs),
            )),
            users: Arc::new(UserService::new(db_pool, clock)),
            lookup_limiter,
        }
    }
}
