use crate::{integrations::flight_data::Flight, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FlightDateQuery {
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FlightStatusQuery {
    /// Comma separated flight numbers, at most 10
    pub flights: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `arrival` or `departure`
    #[serde(rename = "type")]
    pub direction: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/flights/arrivals",
    params(FlightDateQuery),
    responses(
        (status = 200, description = "Arrivals on the date", body = [Flight]),
        (status = 429, description = "Too many lookups"),
        (status = 502, description = "Flight provider failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Flights"
)]
pub async fn arrivals(
    State(state): State<AppState>,
    Query(query): Query<FlightDateQuery>,
) -> ApiResult<Vec<Flight>> {
    let flights = state.services.flights.arrivals(&query.date).await?;
    Ok(Json(ApiResponse::success(flights)))
}

#[utoipa::path(
    get,
    path = "/api/v1/flights/departures",
    params(FlightDateQuery),
    responses(
        (status = 200, description = "Departures on the date", body = [Flight]),
        (status = 429, description = "Too many lookups"),
        (status = 502, description = "Flight provider failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Flights"
)]
pub async fn departures(
    State(state): State<AppState>,
    Query(query): Query<FlightDateQuery>,
) -> ApiResult<Vec<Flight>> {
    let flights = state.services.flights.departures(&query.date).await?;
    Ok(Json(ApiResponse::success(flights)))
}

#[utoipa::path(
    get,
    path = "/api/v1/flights/status",
    params(FlightStatusQuery),
    responses(
        (status = 200, description = "Status of the requested flights", body = [Flight]),
        (status = 400, description = "Bad flight number, date or type", body = crate::errors::ErrorResponse),
        (status = 502, description = "Flight provider failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Flights"
)]
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<FlightStatusQuery>,
) -> ApiResult<Vec<Flight>> {
    let flights = state
        .services
        .flights
        .status(&query.flights, &query.date, &query.direction)
        .await?;
    Ok(Json(ApiResponse::success(flights)))
}
