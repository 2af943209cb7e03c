use super::common::{created_response, SessionId};
use crate::{
    errors::ServiceError,
    services::{
        bookings::{BookingDetails, CancellationResult, CreateBookingRequest, CreatedBooking},
        payments::CheckoutResponse,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Proof of ownership for customer actions on a booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CustomerEmail {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookingLookupRequest {
    #[validate(length(min = 1, max = 16))]
    pub reference: String,
    #[validate(email)]
    pub email: String,
}

/// Book a space. A hold owned by the caller's session is consumed.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    params(("x-session-id" = Option<String>, Header, description = "Checkout session holding a space")),
    responses(
        (status = 201, description = "Booking confirmed", body = CreatedBooking),
        (status = 400, description = "Invalid booking", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown lot or no pricing", body = crate::errors::ErrorResponse),
        (status = 409, description = "No spaces left", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    session: Option<SessionId>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .bookings
        .create(request, session.as_ref().map(SessionId::as_str))
        .await?;
    Ok(created_response(created))
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/lookup",
    request_body = BookingLookupRequest,
    responses(
        (status = 200, description = "The booking", body = BookingDetails),
        (status = 404, description = "No booking with that reference and email", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn lookup_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingLookupRequest>,
) -> ApiResult<BookingDetails> {
    request.validate()?;
    let details = state
        .services
        .bookings
        .find_for_customer(&request.reference, &request.email)
        .await?;
    Ok(Json(ApiResponse::success(details)))
}

/// Cancel before drop-off. Any captured payment is refunded.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{reference}/cancel",
    params(("reference" = String, Path, description = "Booking reference, e.g. PK-7K3M9Q")),
    request_body = CustomerEmail,
    responses(
        (status = 200, description = "Cancelled", body = CancellationResult),
        (status = 404, description = "Unknown booking", body = crate::errors::ErrorResponse),
        (status = 409, description = "Too late to cancel", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<CustomerEmail>,
) -> ApiResult<CancellationResult> {
    request.validate()?;
    let result = state
        .services
        .bookings
        .cancel_by_customer(&reference, &request.email)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{reference}/checkout",
    params(("reference" = String, Path, description = "Booking reference")),
    request_body = CustomerEmail,
    responses(
        (status = 200, description = "Redirect the customer to the gateway", body = CheckoutResponse),
        (status = 409, description = "Booking cannot be paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<CustomerEmail>,
) -> ApiResult<CheckoutResponse> {
    request.validate()?;
    let checkout = state
        .services
        .payments
        .start_checkout(&reference, &request.email)
        .await?;
    Ok(Json(ApiResponse::success(checkout)))
}
