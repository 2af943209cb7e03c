use super::common::paginate;
use crate::{
    entities::{booking, BookingStatus},
    services::{
        addons::{AddonUpdate, UpdateAddonStatusRequest},
        bookings::{BookingDetails, BookingFilter, DailySchedule, ReminderRun},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckInRequest {
    pub spot_number: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignSpotRequest {
    pub spot_number: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/operator/bookings",
    params(BookingFilter),
    responses(
        (status = 200, description = "One page of bookings"),
        (status = 403, description = "Missing bookings:read")
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<PaginatedResponse<booking::Model>> {
    let (items, total, page, limit) = state.services.bookings.list(filter).await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/operator/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking with addons and payment", body = BookingDetails),
        (status = 404, description = "Unknown booking", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingDetails> {
    let details = state.services.bookings.details(booking_id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// Arrivals and departures for one lot and day
#[utoipa::path(
    get,
    path = "/api/v1/operator/lots/{id}/schedule",
    params(("id" = Uuid, Path, description = "Lot id"), ScheduleQuery),
    responses(
        (status = 200, description = "The day's schedule", body = DailySchedule)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn daily_schedule(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<DailySchedule> {
    let schedule = state
        .services
        .bookings
        .daily_schedule(lot_id, &query.date)
        .await?;
    Ok(Json(ApiResponse::success(schedule)))
}

#[utoipa::path(
    put,
    path = "/api/v1/operator/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = booking::Model),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<booking::Model> {
    let booking = state
        .services
        .bookings
        .change_status(booking_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

#[utoipa::path(
    post,
    path = "/api/v1/operator/bookings/{id}/check-in",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = booking::Model),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    request: Option<Json<CheckInRequest>>,
) -> ApiResult<booking::Model> {
    let spot_number = request.and_then(|Json(r)| r.spot_number);
    let booking = state
        .services
        .bookings
        .check_in(booking_id, spot_number)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

#[utoipa::path(
    post,
    path = "/api/v1/operator/bookings/{id}/check-out",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Checked out", body = booking::Model),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn check_out(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    let booking = state.services.bookings.check_out(booking_id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

#[utoipa::path(
    put,
    path = "/api/v1/operator/bookings/{id}/spot",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = AssignSpotRequest,
    responses(
        (status = 200, description = "Spot assigned", body = booking::Model)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn assign_spot(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<AssignSpotRequest>,
) -> ApiResult<booking::Model> {
    let booking = state
        .services
        .bookings
        .assign_spot(booking_id, request.spot_number)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Completing or skipping the last open addon of an IN_PROGRESS booking makes it READY
#[utoipa::path(
    put,
    path = "/api/v1/operator/bookings/{id}/addons/{addon_id}",
    params(
        ("id" = Uuid, Path, description = "Booking id"),
        ("addon_id" = Uuid, Path, description = "Addon line id")
    ),
    request_body = UpdateAddonStatusRequest,
    responses(
        (status = 200, description = "Addon updated", body = AddonUpdate),
        (status = 404, description = "Unknown booking or addon", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn update_addon(
    State(state): State<AppState>,
    Path((booking_id, addon_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAddonStatusRequest>,
) -> ApiResult<AddonUpdate> {
    let update = state
        .services
        .addons
        .update_status(booking_id, addon_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(update)))
}

/// Runs the reminder job now instead of waiting for the next tick
#[utoipa::path(
    post,
    path = "/api/v1/operator/reminders/run",
    responses(
        (status = 200, description = "Reminder run summary", body = ReminderRun)
    ),
    security(("bearer_auth" = [])),
    tag = "Operator"
)]
pub async fn run_reminders(State(state): State<AppState>) -> ApiResult<ReminderRun> {
    let run = state.services.bookings.send_due_reminders().await?;
    Ok(Json(ApiResponse::success(run)))
}
