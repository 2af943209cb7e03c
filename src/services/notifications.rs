//! Customer emails: booking confirmation, cancellation and drop-off reminder.
//!
//! Delivery never affects the state change it follows. Callers get a
//! [`DeliveryOutcome`] to report back and failures are logged here.

use crate::{
    entities::{booking, booking_addon},
    integrations::email::{EmailMessage, EmailSender},
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    /// Notifications are switched off for this instance
    Skipped,
}

#[derive(Clone)]
pub struct NotificationService {
    sender: Option<Arc<dyn EmailSender>>,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A service that sends nothing
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub async fn send_confirmation(
        &self,
        booking: &booking::Model,
        addons: &[booking_addon::Model],
        lot_name: &str,
    ) -> DeliveryOutcome {
        let message = confirmation_message(booking, addons, lot_name);
        self.deliver("confirmation", booking, message).await
    }

    pub async fn send_cancellation(
        &self,
        booking: &booking::Model,
        refunded_amount: Option<i64>,
    ) -> DeliveryOutcome {
        let message = cancellation_message(booking, refunded_amount);
        self.deliver("cancellation", booking, message).await
    }

    pub async fn send_reminder(&self, booking: &booking::Model, lot_name: &str) -> DeliveryOutcome {
        let message = reminder_message(booking, lot_name);
        self.deliver("reminder", booking, message).await
    }

    async fn deliver(
        &self,
        kind: &'static str,
        booking: &booking::Model,
        message: EmailMessage,
    ) -> DeliveryOutcome {
        let Some(sender) = &self.sender else {
            return DeliveryOutcome::Skipped;
        };

        match sender.send(message).await {
            Ok(()) => {
                info!(reference = %booking.reference, kind, "Email sent");
                metrics::counter!("airpark.emails.sent", 1, "kind" => kind);
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!(reference = %booking.reference, kind, error = %e, "Email delivery failed");
                metrics::counter!("airpark.emails.failed", 1, "kind" => kind);
                DeliveryOutcome::Failed
            }
        }
    }
}

fn format_time(value: chrono::DateTime<chrono::Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn confirmation_message(
    booking: &booking::Model,
    addons: &[booking_addon::Model],
    lot_name: &str,
) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Hi {},", booking.customer_name);
    let _ = writeln!(body);
    let _ = writeln!(body, "Your parking booking is confirmed.");
    let _ = writeln!(body);
    let _ = writeln!(body, "Reference: {}", booking.reference);
    let _ = writeln!(body, "Lot: {}", lot_name);
    let _ = writeln!(body, "Vehicle: {}", booking.license_plate);
    let _ = writeln!(body, "Drop-off: {}", format_time(booking.drop_off_time));
    let _ = writeln!(body, "Pick-up: {}", format_time(booking.pick_up_time));
    let _ = writeln!(
        body,
        "Parking: {} days x {} {}",
        booking.total_days, booking.daily_rate, booking.currency
    );
    if booking.discount_amount > 0 {
        let _ = writeln!(body, "Discount: -{} {}", booking.discount_amount, booking.currency);
    }
    for addon in addons {
        let _ = writeln!(body, "Extra: {} {} {}", addon.name, addon.price, booking.currency);
    }
    let _ = writeln!(body, "Total: {} {}", booking.total_price, booking.currency);

    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking confirmed: {}", booking.reference),
        body,
    }
}

fn cancellation_message(booking: &booking::Model, refunded_amount: Option<i64>) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Hi {},", booking.customer_name);
    let _ = writeln!(body);
    let _ = writeln!(body, "Booking {} has been cancelled.", booking.reference);
    if let Some(amount) = refunded_amount {
        let _ = writeln!(body, "A refund of {} {} is on its way.", amount, booking.currency);
    }

    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking cancelled: {}", booking.reference),
        body,
    }
}

fn reminder_message(booking: &booking::Model, lot_name: &str) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Hi {},", booking.customer_name);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "A reminder that you drop off {} at {} on {}.",
        booking.license_plate,
        lot_name,
        format_time(booking.drop_off_time)
    );
    let _ = writeln!(body, "Reference: {}", booking.reference);

    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Parking reminder: {}", booking.reference),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BookingStatus, VehicleType};
    use crate::errors::ServiceError;
    use crate::integrations::email::LogEmailSender;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    struct FailingSender;

    #[async_trait]
    impl EmailSender for FailingSender {
        async fn send(&self, _message: EmailMessage) -> Result<(), ServiceError> {
            Err(ServiceError::upstream("smtp", "connection refused"))
        }
    }

    fn booking() -> booking::Model {
        let drop_off = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        booking::Model {
            id: Uuid::new_v4(),
            reference: "PK-ABC234".into(),
            lot_id: Uuid::new_v4(),
            vehicle_type: VehicleType::Medium,
            license_plate: "AB123".into(),
            vehicle_make: None,
            vehicle_model: None,
            customer_name: "Sigga".into(),
            customer_email: "sigga@example.com".into(),
            customer_phone: None,
            drop_off_time: drop_off,
            pick_up_time: drop_off + chrono::Duration::days(3),
            actual_drop_off_time: None,
            actual_pick_up_time: None,
            departure_flight: None,
            arrival_flight: None,
            status: BookingStatus::Confirmed,
            total_days: 3,
            daily_rate: 2000,
            discount_amount: 0,
            addons_total: 0,
            total_price: 6000,
            currency: "ISK".into(),
            spot_number: None,
            notes: None,
            reminder_sent_at: None,
            cancelled_at: None,
            created_at: drop_off,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn reports_each_outcome() {
        let log = LogEmailSender::new();
        let sent = NotificationService::new(Arc::new(log.clone()))
            .send_confirmation(&booking(), &[], "Long term")
            .await;
        assert_eq!(sent, DeliveryOutcome::Sent);
        let outbox = log.sent().await;
        assert_eq!(outbox.len(), 1);
        assert!(outbox[0].body.contains("PK-ABC234"));
        assert!(outbox[0].body.contains("Total: 6000 ISK"));

        let failed = NotificationService::new(Arc::new(FailingSender))
            .send_cancellation(&booking(), Some(6000))
            .await;
        assert_eq!(failed, DeliveryOutcome::Failed);

        let skipped = NotificationService::disabled()
            .send_reminder(&booking(), "Long term")
            .await;
        assert_eq!(skipped, DeliveryOutcome::Skipped);
    }
}
