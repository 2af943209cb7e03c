use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{BookingStatus, PaymentStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Things that happened, published after the change is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking_id: Uuid,
        reference: String,
        lot_id: Uuid,
    },
    BookingCancelled {
        booking_id: Uuid,
        reference: String,
        by_customer: bool,
    },
    BookingStatusChanged {
        booking_id: Uuid,
        old_status: BookingStatus,
        new_status: BookingStatus,
    },
    SpotHoldGranted {
        session_id: String,
        lot_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    SpotHoldReleased {
        session_id: String,
    },
    PaymentCompleted {
        payment_id: Uuid,
        booking_id: Uuid,
    },
    PaymentFailed {
        payment_id: Uuid,
        booking_id: Uuid,
    },
    PaymentRefunded {
        payment_id: Uuid,
        amount: i64,
        status: PaymentStatus,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::BookingCreated { .. } => "booking.created",
            Event::BookingCancelled { .. } => "booking.cancelled",
            Event::BookingStatusChanged { .. } => "booking.status_changed",
            Event::SpotHoldGranted { .. } => "spot_hold.granted",
            Event::SpotHoldReleased { .. } => "spot_hold.released",
            Event::PaymentCompleted { .. } => "payment.completed",
            Event::PaymentFailed { .. } => "payment.failed",
            Event::PaymentRefunded { .. } => "payment.refunded",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(event = event.name(), payload = %payload, "Domain event");
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::SpotHoldReleased {
                session_id: "s1".into(),
            })
            .await
            .unwrap();

        drop(rx);
        let result = sender
            .send(Event::SpotHoldReleased {
                session_id: "s2".into(),
            })
            .await;
        assert!(result.is_err());

        // never panics or errors out
        sender
            .send_or_log(Event::SpotHoldReleased {
                session_id: "s3".into(),
            })
            .await;
    }

    #[test]
    fn event_names_are_stable() {
        let event = Event::BookingStatusChanged {
            booking_id: Uuid::nil(),
            old_status: BookingStatus::InProgress,
            new_status: BookingStatus::Ready,
        };
        assert_eq!(event.name(), "booking.status_changed");
    }
}
