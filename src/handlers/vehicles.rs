use crate::{services::vehicles::VehicleLookup, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};

/// Registry lookup with the size class used for pricing
#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{plate}",
    params(("plate" = String, Path, description = "Licence plate, spaces and dashes ignored")),
    responses(
        (status = 200, description = "Vehicle found", body = VehicleLookup),
        (status = 404, description = "Unknown plate", body = crate::errors::ErrorResponse),
        (status = 429, description = "Too many lookups"),
        (status = 502, description = "Registry failed and nothing cached", body = crate::errors::ErrorResponse)
    ),
    tag = "Vehicles"
)]
pub async fn lookup_vehicle(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> ApiResult<VehicleLookup> {
    let lookup = state.services.vehicles.lookup(&plate).await?;
    Ok(Json(ApiResponse::success(lookup)))
}
