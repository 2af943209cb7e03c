use crate::{services::payments::WebhookOutcome, ApiResponse, ApiResult, AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = crate::services::payments::PaymentWebhookPayload,
    params(
        ("x-timestamp" = Option<String>, Header, description = "Unix seconds the gateway signed at"),
        ("x-signature" = Option<String>, Header, description = "Hex HMAC-SHA256 of `{timestamp}.{body}`")
    ),
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookOutcome),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookOutcome> {
    let outcome = state
        .services
        .payments
        .handle_webhook(
            header_str(&headers, TIMESTAMP_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
