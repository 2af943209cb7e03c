//! Payments mirror the gateway: a PENDING row is written when checkout
//! starts, the gateway's webhook settles it, and refunds are issued through
//! the gateway before the local row is updated.

use crate::{
    common::SharedClock,
    db::DbPool,
    entities::{
        booking::{self, Entity as BookingEntity},
        payment::{self, Entity as PaymentEntity},
        BookingStatus, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    integrations::payment_gateway::{CheckoutRequest, PaymentGateway, RefundStatus},
    services::{booking_lifecycle::BookingLifecycle, bookings::find_customer_booking},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 over `{timestamp}.{body}`.
pub fn sign_webhook(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("invalid webhook secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Checks the `x-timestamp`/`x-signature` pair against the shared secret.
pub fn verify_webhook_signature(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(ServiceError::Unauthorized(
            "missing webhook signature headers".to_string(),
        ));
    };

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| ServiceError::Unauthorized("invalid webhook timestamp".to_string()))?;
    if (now_unix - sent_at).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::Unauthorized(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let expected = sign_webhook(secret, timestamp.trim(), body)?;
    if constant_time_eq(&expected, signature.trim()) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ))
    }
}

#[derive(Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub return_url: String,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub payment_id: Uuid,
    pub booking_reference: String,
    pub amount: i64,
    pub currency: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentWebhookPayload {
    /// Gateway event id
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub checkout_id: String,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WebhookDisposition {
    Processed,
    /// Already applied by an earlier delivery
    Duplicate,
    Ignored,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookOutcome {
    pub disposition: WebhookDisposition,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefundRequest {
    /// Defaults to everything not yet refunded
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

/// What happened to the money when a booking was cancelled
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundOutcome {
    /// Missing when the payment itself could not be loaded
    pub payment_id: Option<Uuid>,
    pub amount: i64,
    pub succeeded: bool,
    pub error: Option<String>,
}

enum WebhookKind {
    Completed,
    Failed,
}

fn webhook_kind(event_type: &str) -> Option<WebhookKind> {
    match event_type {
        "payment.completed" | "payment.succeeded" => Some(WebhookKind::Completed),
        "payment.failed" => Some(WebhookKind::Failed),
        _ => None,
    }
}

/// Most recent payment row of a booking
pub async fn latest_payment<C: ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
) -> Result<Option<payment::Model>, ServiceError> {
    PaymentEntity::find()
        .filter(payment::Column::BookingId.eq(booking_id))
        .order_by_desc(payment::Column::CreatedAt)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: BookingLifecycle,
    events: Arc<EventSender>,
    clock: SharedClock,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        lifecycle: BookingLifecycle,
        events: Arc<EventSender>,
        clock: SharedClock,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            db,
            gateway,
            lifecycle,
            events,
            clock,
            settings,
        }
    }

    /// Starts a hosted checkout for a confirmed, unpaid booking. A still-pending
    /// checkout is handed out again instead of opening a second one.
    #[instrument(skip(self, email))]
    pub async fn start_checkout(
        &self,
        reference: &str,
        email: &str,
    ) -> Result<CheckoutResponse, ServiceError> {
        let booking = find_customer_booking(&*self.db, reference, email).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(ServiceError::Conflict(format!(
                "booking {} is {} and cannot be paid",
                booking.reference, booking.status
            )));
        }

        if let Some(existing) = latest_payment(&*self.db, booking.id).await? {
            match existing.status {
                PaymentStatus::Pending => {
                    if let Some(redirect_url) = existing.redirect_url.clone() {
                        return Ok(CheckoutResponse {
                            payment_id: existing.id,
                            booking_reference: booking.reference,
                            amount: existing.amount,
                            currency: existing.currency,
                            redirect_url,
                        });
                    }
                }
                PaymentStatus::Failed => {}
                _ => {
                    return Err(ServiceError::Conflict(format!(
                        "booking {} is already paid",
                        booking.reference
                    )))
                }
            }
        }

        let session = self
            .gateway
            .create_checkout(CheckoutRequest {
                amount: booking.total_price,
                currency: booking.currency.clone(),
                booking_reference: booking.reference.clone(),
                return_url: self.settings.return_url.clone(),
            })
            .await?;

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking.id),
            amount: Set(booking.total_price),
            currency: Set(booking.currency.clone()),
            status: Set(PaymentStatus::Pending),
            provider_reference: Set(Some(session.checkout_id.clone())),
            redirect_url: Set(Some(session.redirect_url.clone())),
            refunded_amount: Set(0),
            refund_reason: Set(None),
            failure_reason: Set(None),
            completed_at: Set(None),
            created_at: Set(self.clock.now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(payment_id = %payment.id, reference = %booking.reference, "Checkout started");

        Ok(CheckoutResponse {
            payment_id: payment.id,
            booking_reference: booking.reference,
            amount: payment.amount,
            currency: payment.currency,
            redirect_url: session.redirect_url,
        })
    }

    /// Verifies (when a secret is configured) and applies a gateway webhook.
    #[instrument(skip(self, body))]
    pub async fn handle_webhook(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, ServiceError> {
        if let Some(secret) = &self.settings.webhook_secret {
            if let Err(e) = verify_webhook_signature(
                secret,
                timestamp,
                signature,
                body,
                Utc::now().timestamp(),
                self.settings.webhook_tolerance_secs,
            ) {
                warn!("Payment webhook signature verification failed");
                counter!("airpark.payments.webhook_rejected", 1);
                return Err(e);
            }
        }

        let payload: PaymentWebhookPayload = serde_json::from_slice(body)
            .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {}", e)))?;

        let Some(kind) = webhook_kind(&payload.event_type) else {
            info!(event_type = %payload.event_type, "Unhandled payment webhook type");
            return Ok(WebhookOutcome {
                disposition: WebhookDisposition::Ignored,
                payment_id: None,
            });
        };

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let payment = PaymentEntity::find()
            .filter(payment::Column::ProviderReference.eq(payload.checkout_id.clone()))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No payment for checkout {}", payload.checkout_id))
            })?;
        let payment_id = payment.id;
        let booking_id = payment.booking_id;

        let (disposition, events) = match kind {
            WebhookKind::Completed => match payment.status {
                PaymentStatus::Pending => {
                    let mut active: payment::ActiveModel = payment.into();
                    active.status = Set(PaymentStatus::Completed);
                    active.completed_at = Set(Some(self.clock.now()));
                    active.update(&txn).await.map_err(ServiceError::db_error)?;
                    (
                        WebhookDisposition::Processed,
                        vec![Event::PaymentCompleted {
                            payment_id,
                            booking_id,
                        }],
                    )
                }
                PaymentStatus::Completed
                | PaymentStatus::PartiallyRefunded
                | PaymentStatus::Refunded => (WebhookDisposition::Duplicate, Vec::new()),
                PaymentStatus::Failed => {
                    warn!(payment_id = %payment_id, "Completion received for a failed payment");
                    (WebhookDisposition::Ignored, Vec::new())
                }
            },
            WebhookKind::Failed => match payment.status {
                PaymentStatus::Pending => {
                    let mut active: payment::ActiveModel = payment.into();
                    active.status = Set(PaymentStatus::Failed);
                    active.failure_reason = Set(payload.failure_reason.clone());
                    active.update(&txn).await.map_err(ServiceError::db_error)?;

                    let mut events = vec![Event::PaymentFailed {
                        payment_id,
                        booking_id,
                    }];
                    if let Some(cancelled) = self.cancel_unpaid_booking(&txn, booking_id).await? {
                        events.push(Event::BookingCancelled {
                            booking_id,
                            reference: cancelled.reference,
                            by_customer: false,
                        });
                    }
                    (WebhookDisposition::Processed, events)
                }
                PaymentStatus::Failed => (WebhookDisposition::Duplicate, Vec::new()),
                _ => {
                    warn!(payment_id = %payment_id, status = %payment.status, "Failure received for a settled payment");
                    (WebhookDisposition::Ignored, Vec::new())
                }
            },
        };

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            payment_id = %payment_id,
            event_type = %payload.event_type,
            event_id = payload.id.as_deref().unwrap_or(""),
            disposition = ?disposition,
            "Payment webhook applied"
        );
        for event in events {
            self.events.send_or_log(event).await;
        }

        Ok(WebhookOutcome {
            disposition,
            payment_id: Some(payment_id),
        })
    }

    async fn cancel_unpaid_booking<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
    ) -> Result<Option<booking::Model>, ServiceError> {
        let booking = BookingEntity::find_by_id(booking_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if booking.status.is_terminal() {
            return Ok(None);
        }
        let outcome = self
            .lifecycle
            .transition(conn, booking, BookingStatus::Cancelled)
            .await?;
        counter!("airpark.bookings.cancelled", 1, "by" => "payment");
        Ok(Some(outcome.booking))
    }

    /// Refunds part or all of a captured payment.
    #[instrument(skip(self, request))]
    pub async fn refund(
        &self,
        payment_id: Uuid,
        request: RefundRequest,
    ) -> Result<payment::Model, ServiceError> {
        let payment = PaymentEntity::find_by_id(payment_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if !payment.status.is_refundable() {
            return Err(ServiceError::Conflict(format!(
                "payment {} is {} and cannot be refunded",
                payment_id, payment.status
            )));
        }

        let remaining = payment.refundable_amount();
        let amount = request.amount.unwrap_or(remaining);
        if amount <= 0 || amount > remaining {
            return Err(ServiceError::ValidationError(format!(
                "refund amount must be between 1 and {}",
                remaining
            )));
        }

        let reason = request
            .reason
            .unwrap_or_else(|| "requested_by_operator".to_string());
        self.issue_refund(payment, amount, reason).await
    }

    /// Refunds whatever is left on the booking's captured payment. `None` when
    /// nothing was paid. A payment that cannot be loaded is reported as a
    /// failed refund.
    pub async fn refund_booking(&self, booking_id: Uuid, reason: &str) -> Option<RefundOutcome> {
        let payment = match latest_payment(&*self.db, booking_id).await {
            Ok(Some(p)) if p.status.is_refundable() && p.refundable_amount() > 0 => p,
            Ok(_) => return None,
            Err(e) => {
                error!(booking_id = %booking_id, error = %e, "Could not load payment for refund");
                return Some(RefundOutcome {
                    payment_id: None,
                    amount: 0,
                    succeeded: false,
                    error: Some(e.response_message()),
                });
            }
        };
        let payment_id = payment.id;
        let amount = payment.refundable_amount();

        match self.issue_refund(payment, amount, reason.to_string()).await {
            Ok(_) => Some(RefundOutcome {
                payment_id: Some(payment_id),
                amount,
                succeeded: true,
                error: None,
            }),
            Err(e) => {
                warn!(booking_id = %booking_id, payment_id = %payment_id, error = %e, "Refund failed");
                Some(RefundOutcome {
                    payment_id: Some(payment_id),
                    amount,
                    succeeded: false,
                    error: Some(e.response_message()),
                })
            }
        }
    }

    /// Reserves the amount on the row before the gateway is called, so
    /// concurrent refunds can never add up to more than was captured.
    async fn issue_refund(
        &self,
        payment: payment::Model,
        amount: i64,
        reason: String,
    ) -> Result<payment::Model, ServiceError> {
        let payment_id = payment.id;
        let provider_reference = payment.provider_reference.clone().ok_or_else(|| {
            ServiceError::Conflict(format!("payment {} has no gateway reference", payment_id))
        })?;

        self.reserve_refund(payment_id, amount).await?;

        let refund_id = match self
            .gateway
            .refund(&provider_reference, amount, &reason)
            .await
        {
            Ok(result) if result.status != RefundStatus::Failed => result.refund_id,
            Ok(result) => {
                self.release_refund(payment_id, amount).await;
                return Err(ServiceError::UpstreamFailure(format!(
                    "gateway declined refund {}",
                    result.refund_id
                )));
            }
            Err(e) => {
                self.release_refund(payment_id, amount).await;
                return Err(e);
            }
        };

        PaymentEntity::update_many()
            .col_expr(payment::Column::RefundReason, Expr::val(reason).into())
            .filter(payment::Column::Id.eq(payment_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let updated = PaymentEntity::find_by_id(payment_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        info!(payment_id = %payment_id, refund_id = %refund_id, amount, status = %updated.status, "Payment refunded");
        counter!("airpark.payments.refunded", 1);
        self.events
            .send_or_log(Event::PaymentRefunded {
                payment_id,
                amount,
                status: updated.status,
            })
            .await;

        Ok(updated)
    }

    /// Adds `amount` to the refunded total in a single conditional update.
    async fn reserve_refund(&self, payment_id: Uuid, amount: i64) -> Result<(), ServiceError> {
        let result = PaymentEntity::update_many()
            .col_expr(
                payment::Column::RefundedAmount,
                Expr::col(payment::Column::RefundedAmount).add(amount),
            )
            .col_expr(payment::Column::Status, status_after_refund_change(amount))
            .col_expr(payment::Column::UpdatedAt, Expr::val(self.clock.now()).into())
            .filter(payment::Column::Id.eq(payment_id))
            .filter(payment::Column::Status.is_in(PaymentStatus::REFUNDABLE))
            .filter(
                Expr::expr(Expr::col(payment::Column::RefundedAmount).add(amount))
                    .lte(Expr::col(payment::Column::Amount)),
            )
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 1 {
            return Ok(());
        }

        let current = PaymentEntity::find_by_id(payment_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;
        if !current.status.is_refundable() {
            return Err(ServiceError::Conflict(format!(
                "payment {} is {} and cannot be refunded",
                payment_id, current.status
            )));
        }
        Err(ServiceError::ValidationError(format!(
            "refund amount must be between 1 and {}",
            current.refundable_amount()
        )))
    }

    /// Gives back a reservation the gateway refused.
    async fn release_refund(&self, payment_id: Uuid, amount: i64) {
        let released = PaymentEntity::update_many()
            .col_expr(
                payment::Column::RefundedAmount,
                Expr::col(payment::Column::RefundedAmount).sub(amount),
            )
            .col_expr(payment::Column::Status, status_after_refund_change(-amount))
            .col_expr(payment::Column::UpdatedAt, Expr::val(self.clock.now()).into())
            .filter(payment::Column::Id.eq(payment_id))
            .exec(&*self.db)
            .await;

        if let Err(e) = released {
            error!(payment_id = %payment_id, amount, error = %e, "Could not release refund reservation");
        }
    }
}

/// Status the row ends up in once `delta` is added to its refunded total.
/// Evaluated against the pre-update row, like every SET expression.
fn status_after_refund_change(delta: i64) -> SimpleExpr {
    let refunded = || Expr::expr(Expr::col(payment::Column::RefundedAmount).add(delta));
    Expr::case(
        refunded().gte(Expr::col(payment::Column::Amount)),
        Expr::val(PaymentStatus::Refunded.to_value()),
    )
    .case(
        refunded().gt(0),
        Expr::val(PaymentStatus::PartiallyRefunded.to_value()),
    )
    .finally(Expr::val(PaymentStatus::Completed.to_value()))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn signature_round_trip_and_tolerance() {
        let body = br#"{"type":"payment.completed","checkout_id":"chk_1"}"#;
        let sig = sign_webhook("whsec", "1700000000", body).unwrap();

        assert!(verify_webhook_signature("whsec", Some("1700000000"), Some(&sig), body, 1_700_000_100, 300).is_ok());
        assert_matches!(
            verify_webhook_signature("whsec", Some("1700000000"), Some(&sig), body, 1_700_000_400, 300),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            verify_webhook_signature("other", Some("1700000000"), Some(&sig), body, 1_700_000_000, 300),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            verify_webhook_signature("whsec", None, Some(&sig), body, 1_700_000_000, 300),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn webhook_types() {
        assert!(matches!(webhook_kind("payment.succeeded"), Some(WebhookKind::Completed)));
        assert!(matches!(webhook_kind("payment.failed"), Some(WebhookKind::Failed)));
        assert!(webhook_kind("payment.disputed").is_none());
    }
}
