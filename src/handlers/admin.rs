//! Back-office endpoints: lots, pricing, the addon catalog, refunds, users
//! and hold maintenance. Each group sits behind its own permission.

use super::common::{created_response, InactiveFilter};
use crate::{
    entities::{lot, lot_pricing, payment, service_offering},
    errors::ServiceError,
    services::{
        catalog::{CreateServiceOfferingRequest, UpdateServiceOfferingRequest},
        lots::{CreateLotRequest, LotRemoval, UpdateLotRequest},
        payments::RefundRequest,
        pricing::{PricingUpsertResult, UpsertPricingRequest},
        users::{CreateUserRequest, UpdateUserRequest, UserResponse},
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct LotRemovalResponse {
    pub lot_id: Uuid,
    pub outcome: LotRemoval,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeHoldsResponse {
    pub purged: u64,
}

// ----- lots -----

#[utoipa::path(
    get,
    path = "/api/v1/admin/lots",
    params(InactiveFilter),
    responses((status = 200, description = "Lots", body = [lot::Model])),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<InactiveFilter>,
) -> ApiResult<Vec<lot::Model>> {
    let lots = state.services.lots.list(filter.include_inactive).await?;
    Ok(Json(ApiResponse::success(lots)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/lots",
    request_body = CreateLotRequest,
    responses(
        (status = 201, description = "Lot created", body = lot::Model),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_lot(
    State(state): State<AppState>,
    Json(request): Json<CreateLotRequest>,
) -> Result<Response, ServiceError> {
    let lot = state.services.lots.create(request).await?;
    Ok(created_response(lot))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/lots/{id}",
    params(("id" = Uuid, Path, description = "Lot id")),
    responses((status = 200, description = "Lot", body = lot::Model)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> ApiResult<lot::Model> {
    let lot = state.services.lots.get(lot_id).await?;
    Ok(Json(ApiResponse::success(lot)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/lots/{id}",
    params(("id" = Uuid, Path, description = "Lot id")),
    request_body = UpdateLotRequest,
    responses((status = 200, description = "Lot updated", body = lot::Model)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Json(request): Json<UpdateLotRequest>,
) -> ApiResult<lot::Model> {
    let lot = state.services.lots.update(lot_id, request).await?;
    Ok(Json(ApiResponse::success(lot)))
}

/// Deletes an unused lot; a lot with bookings is deactivated instead
#[utoipa::path(
    delete,
    path = "/api/v1/admin/lots/{id}",
    params(("id" = Uuid, Path, description = "Lot id")),
    responses((status = 200, description = "Deleted or deactivated", body = LotRemovalResponse)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> ApiResult<LotRemovalResponse> {
    let outcome = state.services.lots.remove(lot_id).await?;
    Ok(Json(ApiResponse::success(LotRemovalResponse { lot_id, outcome })))
}

// ----- pricing -----

#[utoipa::path(
    get,
    path = "/api/v1/admin/lots/{id}/pricing",
    params(("id" = Uuid, Path, description = "Lot id")),
    responses((status = 200, description = "Active pricing rows", body = [lot_pricing::Model])),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_pricing(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> ApiResult<Vec<lot_pricing::Model>> {
    let rows = state.services.pricing.list_for_lot(lot_id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// Replaces the active price for one vehicle type
#[utoipa::path(
    put,
    path = "/api/v1/admin/lots/{id}/pricing",
    params(("id" = Uuid, Path, description = "Lot id")),
    request_body = UpsertPricingRequest,
    responses(
        (status = 200, description = "Pricing stored, with policy warnings", body = PricingUpsertResult),
        (status = 400, description = "Invalid price or percent", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn upsert_pricing(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Json(request): Json<UpsertPricingRequest>,
) -> ApiResult<PricingUpsertResult> {
    let result = state.services.pricing.upsert(lot_id, request).await?;
    Ok(Json(ApiResponse::success(result)))
}

// ----- service catalog -----

#[utoipa::path(
    get,
    path = "/api/v1/admin/services",
    params(InactiveFilter),
    responses((status = 200, description = "Service offerings", body = [service_offering::Model])),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_services(
    State(state): State<AppState>,
    Query(filter): Query<InactiveFilter>,
) -> ApiResult<Vec<service_offering::Model>> {
    let offerings = state.services.catalog.list(filter.include_inactive).await?;
    Ok(Json(ApiResponse::success(offerings)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/services",
    request_body = CreateServiceOfferingRequest,
    responses((status = 201, description = "Offering created", body = service_offering::Model)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<CreateServiceOfferingRequest>,
) -> Result<Response, ServiceError> {
    let offering = state.services.catalog.create(request).await?;
    Ok(created_response(offering))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/services/{id}",
    params(("id" = Uuid, Path, description = "Offering id")),
    request_body = UpdateServiceOfferingRequest,
    responses((status = 200, description = "Offering updated", body = service_offering::Model)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_service(
    State(state): State<AppState>,
    Path(offering_id): Path<Uuid>,
    Json(request): Json<UpdateServiceOfferingRequest>,
) -> ApiResult<service_offering::Model> {
    let offering = state.services.catalog.update(offering_id, request).await?;
    Ok(Json(ApiResponse::success(offering)))
}

// ----- payments -----

/// Full or partial refund of a captured payment
#[utoipa::path(
    post,
    path = "/api/v1/admin/payments/{id}/refund",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund issued", body = payment::Model),
        (status = 400, description = "Amount exceeds what is left", body = crate::errors::ErrorResponse),
        (status = 409, description = "Payment not refundable", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway refused", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    request: Option<Json<RefundRequest>>,
) -> ApiResult<payment::Model> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let payment = state.services.payments.refund(payment_id, request).await?;
    Ok(Json(ApiResponse::success(payment)))
}

// ----- users -----

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses((status = 200, description = "Back-office users", body = [UserResponse])),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserResponse>> {
    let users = state.services.users.list().await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 409, description = "Email already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.create(request).await?;
    Ok(created_response(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "User updated", body = UserResponse)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<UserResponse> {
    let user = state.services.users.update(user_id, request).await?;
    Ok(Json(ApiResponse::success(user)))
}

// ----- holds -----

#[utoipa::path(
    post,
    path = "/api/v1/admin/holds/purge",
    responses((status = 200, description = "Expired holds removed", body = PurgeHoldsResponse)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn purge_holds(State(state): State<AppState>) -> ApiResult<PurgeHoldsResponse> {
    let purged = state.services.holds.purge_expired().await?;
    info!(purged, "Expired spot holds purged on request");
    Ok(Json(ApiResponse::success(PurgeHoldsResponse { purged })))
}
