use super::common::LocaleQuery;
use crate::{
    common::DateRangeParams,
    entities::{service_offering, VehicleType},
    errors::ServiceError,
    services::{
        availability::{LotAvailability, RangeAvailability},
        pricing::PriceQuote,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuoteQuery {
    pub vehicle_type: VehicleType,
    /// RFC 3339 instant
    pub drop_off_time: DateTime<Utc>,
    /// RFC 3339 instant
    pub pick_up_time: DateTime<Utc>,
}

/// Active lots with the number of spaces free right now
#[utoipa::path(
    get,
    path = "/api/v1/lots",
    params(LocaleQuery),
    responses(
        (status = 200, description = "Active lots", body = [LotAvailability])
    ),
    tag = "Lots"
)]
pub async fn list_lots(
    State(state): State<AppState>,
    Query(query): Query<LocaleQuery>,
) -> ApiResult<Vec<LotAvailability>> {
    let lots = state
        .services
        .availability
        .list_active_lots(query.locale.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(lots)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}",
    params(("id" = Uuid, Path, description = "Lot id"), LocaleQuery),
    responses(
        (status = 200, description = "Lot snapshot", body = LotAvailability),
        (status = 404, description = "Unknown lot", body = crate::errors::ErrorResponse)
    ),
    tag = "Lots"
)]
pub async fn get_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Query(query): Query<LocaleQuery>,
) -> ApiResult<LotAvailability> {
    let snapshot = state
        .services
        .availability
        .lot_snapshot(lot_id, query.locale.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Spaces free for a whole date range, counting bookings and live holds
#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/availability",
    params(("id" = Uuid, Path, description = "Lot id"), DateRangeParams),
    responses(
        (status = 200, description = "Range availability", body = RangeAvailability),
        (status = 400, description = "Bad dates", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown lot", body = crate::errors::ErrorResponse)
    ),
    tag = "Lots"
)]
pub async fn lot_availability(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Query(range): Query<DateRangeParams>,
) -> ApiResult<RangeAvailability> {
    let (start, end) = range.to_datetime_range()?;
    let availability = state
        .services
        .availability
        .range(lot_id, start, end)
        .await?;
    Ok(Json(ApiResponse::success(availability)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/quote",
    params(("id" = Uuid, Path, description = "Lot id"), QuoteQuery),
    responses(
        (status = 200, description = "Price for the stay", body = PriceQuote),
        (status = 404, description = "No active pricing", body = crate::errors::ErrorResponse)
    ),
    tag = "Lots"
)]
pub async fn quote(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<PriceQuote> {
    if query.pick_up_time <= query.drop_off_time {
        return Err(ServiceError::ValidationError(
            "pick_up_time must be after drop_off_time".to_string(),
        ));
    }
    let quote = state
        .services
        .pricing
        .quote(lot_id, query.vehicle_type, query.drop_off_time, query.pick_up_time)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Addons that can be attached to a new booking
#[utoipa::path(
    get,
    path = "/api/v1/services",
    responses(
        (status = 200, description = "Active service offerings", body = [service_offering::Model])
    ),
    tag = "Lots"
)]
pub async fn list_services(State(state): State<AppState>) -> ApiResult<Vec<service_offering::Model>> {
    let offerings = state.services.catalog.list(false).await?;
    Ok(Json(ApiResponse::success(offerings)))
}
