use super::common::{no_content_response, SessionId};
use crate::{
    common::DateRangeParams,
    errors::ServiceError,
    services::spot_holds::SpotHold,
    ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, response::Json, response::Response};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReserveSpotRequest {
    pub lot_id: Uuid,
    /// `YYYY-MM-DD`, held from 00:00:00 UTC
    pub start_date: String,
    /// `YYYY-MM-DD`, held until 23:59:59 UTC
    pub end_date: String,
}

/// Hold a space for the caller's checkout session
#[utoipa::path(
    post,
    path = "/api/v1/holds",
    request_body = ReserveSpotRequest,
    params(("x-session-id" = String, Header, description = "Checkout session")),
    responses(
        (status = 200, description = "Hold granted", body = SpotHold),
        (status = 409, description = "No spaces left", body = crate::errors::ErrorResponse)
    ),
    tag = "Spot holds"
)]
pub async fn reserve(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<ReserveSpotRequest>,
) -> ApiResult<SpotHold> {
    let (start, end) = DateRangeParams {
        start_date: request.start_date,
        end_date: request.end_date,
    }
    .to_datetime_range()?;
    let hold = state
        .services
        .holds
        .reserve(session.as_str(), request.lot_id, start, end)
        .await?;
    Ok(Json(ApiResponse::success(hold)))
}

#[utoipa::path(
    get,
    path = "/api/v1/holds/current",
    params(("x-session-id" = String, Header, description = "Checkout session")),
    responses(
        (status = 200, description = "The session's live hold", body = SpotHold),
        (status = 404, description = "No live hold", body = crate::errors::ErrorResponse)
    ),
    tag = "Spot holds"
)]
pub async fn current(State(state): State<AppState>, session: SessionId) -> ApiResult<SpotHold> {
    let hold = state
        .services
        .holds
        .get(session.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound("no active hold for this session".to_string()))?;
    Ok(Json(ApiResponse::success(hold)))
}

/// Re-checks availability and restarts the hold timer
#[utoipa::path(
    post,
    path = "/api/v1/holds/current/extend",
    params(("x-session-id" = String, Header, description = "Checkout session")),
    responses(
        (status = 200, description = "Hold extended", body = SpotHold),
        (status = 404, description = "Nothing to extend", body = crate::errors::ErrorResponse),
        (status = 409, description = "The space was taken meanwhile", body = crate::errors::ErrorResponse)
    ),
    tag = "Spot holds"
)]
pub async fn extend(State(state): State<AppState>, session: SessionId) -> ApiResult<SpotHold> {
    let hold = state.services.holds.extend(session.as_str()).await?;
    Ok(Json(ApiResponse::success(hold)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/holds/current",
    params(("x-session-id" = String, Header, description = "Checkout session")),
    responses(
        (status = 204, description = "Released (or there was nothing to release)")
    ),
    tag = "Spot holds"
)]
pub async fn release(
    State(state): State<AppState>,
    session: SessionId,
) -> Result<Response, ServiceError> {
    state.services.holds.release(session.as_str()).await?;
    Ok(no_content_response())
}
