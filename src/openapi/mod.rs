use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer scheme referenced by `security(("bearer_auth" = []))`.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Airpark API",
        version = "0.2.1",
        description = r#"
# Airpark parking API

Bookings for an airport parking operator.

## Booking flow

1. `GET /api/v1/lots` and `GET /api/v1/lots/{id}/quote` to pick a lot and see the price.
2. `POST /api/v1/holds` with an `x-session-id` header holds a space while the customer checks out.
   Holds expire after a fixed time; `POST /api/v1/holds/current/extend` re-checks availability.
3. `POST /api/v1/bookings` with the same session header confirms the booking and consumes the hold.
4. `POST /api/v1/bookings/{reference}/checkout` redirects to the payment gateway.

## Authentication

Operator and admin endpoints require a bearer token from `POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Rate Limiting

Flight and vehicle lookups are rate limited per client. Check the response headers:
- `X-RateLimit-Limit`: Maximum requests per window
- `X-RateLimit-Remaining`: Remaining requests in current window
- `X-RateLimit-Reset`: Seconds until the window resets

## Errors

```json
{
  "error": "Conflict",
  "code": "no_spots_available",
  "message": "No spots available",
  "request_id": "9f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Lots", description = "Lots, availability and quotes"),
        (name = "Spot holds", description = "Temporary holds during checkout"),
        (name = "Bookings", description = "Customer bookings"),
        (name = "Payments", description = "Checkout and gateway webhooks"),
        (name = "Flights", description = "Flight schedule lookups"),
        (name = "Vehicles", description = "Vehicle registry lookups"),
        (name = "Operator", description = "Check-in and check-out workflow"),
        (name = "Admin", description = "Back-office administration"),
        (name = "auth", description = "Sign-in for operators and admins")
    ),
    modifiers(&BearerAuth),
    paths(
        // Lots
        crate::handlers::lots::list_lots,
        crate::handlers::lots::get_lot,
        crate::handlers::lots::lot_availability,
        crate::handlers::lots::quote,
        crate::handlers::lots::list_services,

        // Spot holds
        crate::handlers::spot_holds::reserve,
        crate::handlers::spot_holds::current,
        crate::handlers::spot_holds::extend,
        crate::handlers::spot_holds::release,

        // Bookings
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::lookup_booking,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::start_checkout,

        // Payments
        crate::handlers::payments::payment_webhook,

        // Lookups
        crate::handlers::flights::arrivals,
        crate::handlers::flights::departures,
        crate::handlers::flights::status,
        crate::handlers::vehicles::lookup_vehicle,

        // Operator
        crate::handlers::operator::list_bookings,
        crate::handlers::operator::get_booking,
        crate::handlers::operator::daily_schedule,
        crate::handlers::operator::update_status,
        crate::handlers::operator::check_in,
        crate::handlers::operator::check_out,
        crate::handlers::operator::assign_spot,
        crate::handlers::operator::update_addon,
        crate::handlers::operator::run_reminders,

        // Admin
        crate::handlers::admin::list_lots,
        crate::handlers::admin::create_lot,
        crate::handlers::admin::get_lot,
        crate::handlers::admin::update_lot,
        crate::handlers::admin::delete_lot,
        crate::handlers::admin::list_pricing,
        crate::handlers::admin::upsert_pricing,
        crate::handlers::admin::list_services,
        crate::handlers::admin::create_service,
        crate::handlers::admin::update_service,
        crate::handlers::admin::refund_payment,
        crate::handlers::admin::list_users,
        crate::handlers::admin::create_user,
        crate::handlers::admin::update_user,
        crate::handlers::admin::purge_holds,

        // Auth
        crate::auth::login_handler,
        crate::auth::refresh_token_handler,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::entities::VehicleType,
            crate::entities::BookingStatus,
            crate::entities::AddonStatus,
            crate::entities::PaymentStatus,
            crate::entities::UserRole,
            crate::services::pricing::DiscountTier,
            crate::services::notifications::DeliveryOutcome,
            crate::services::payments::WebhookDisposition,
            crate::services::vehicles::VehicleSource,
            crate::integrations::flight_data::FlightDirection,
            crate::handlers::bookings::CustomerEmail,
            crate::handlers::operator::UpdateStatusRequest,
            crate::handlers::operator::CheckInRequest,
            crate::handlers::operator::AssignSpotRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_the_booking_flow() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Airpark API"));
        assert!(json.contains("/api/v1/holds"));
        assert!(json.contains("/api/v1/bookings/{reference}/cancel"));
        assert!(json.contains("bearer_auth"));
    }
}
