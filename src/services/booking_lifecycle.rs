//! Booking status state machine and the listener that reacts to addon changes.

use crate::{
    common::SharedClock,
    entities::{
        booking::{self, Entity as BookingEntity},
        booking_addon::{self, Entity as BookingAddonEntity},
        AddonStatus, BookingStatus,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Domain events consumed inside the unit of work that raised them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    AddonStatusChanged {
        booking_id: Uuid,
        addon_id: Uuid,
        old_status: AddonStatus,
        new_status: AddonStatus,
    },
}

/// Result of applying a status change
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: booking::Model,
    pub previous: BookingStatus,
    /// `false` when the booking was already in the requested status
    pub changed: bool,
}

/// Status an `IN_PROGRESS` booking should move to once all its addons are
/// settled. Any other current status yields `None`.
pub fn auto_advance_target(
    current: BookingStatus,
    addons: &[AddonStatus],
) -> Option<BookingStatus> {
    if current != BookingStatus::InProgress {
        return None;
    }
    addons
        .iter()
        .all(|status| status.is_settled())
        .then_some(BookingStatus::Ready)
}

/// Checks the customer-facing cancellation rule.
pub fn ensure_customer_can_cancel(
    booking: &booking::Model,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if matches!(
        booking.status,
        BookingStatus::Cancelled | BookingStatus::CheckedOut | BookingStatus::NoShow
    ) {
        return Err(ServiceError::CannotCancel(format!(
            "booking {} is {}",
            booking.reference, booking.status
        )));
    }
    if booking.drop_off_time <= now {
        return Err(ServiceError::CannotCancel(format!(
            "drop-off time for booking {} has passed",
            booking.reference
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BookingLifecycle {
    clock: SharedClock,
}

impl BookingLifecycle {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Moves a booking to `next`, recording the side-effect timestamps.
    #[instrument(skip(self, conn, booking), fields(booking_id = %booking.id, from = %booking.status, to = %next))]
    pub async fn transition<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking: booking::Model,
        next: BookingStatus,
    ) -> Result<TransitionOutcome, ServiceError> {
        let previous = booking.status;
        if previous == next {
            debug!("Status unchanged");
            return Ok(TransitionOutcome {
                booking,
                previous,
                changed: false,
            });
        }
        if !previous.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                from: previous.to_string(),
                to: next.to_string(),
            });
        }

        let now = self.clock.now();
        let entered_lot = matches!(
            next,
            BookingStatus::CheckedIn
                | BookingStatus::InProgress
                | BookingStatus::Ready
                | BookingStatus::CheckedOut
        );
        let record_drop_off =
            next == BookingStatus::CheckedIn || (entered_lot && booking.actual_drop_off_time.is_none());

        let mut active: booking::ActiveModel = booking.into();
        active.status = Set(next);
        if record_drop_off {
            active.actual_drop_off_time = Set(Some(now));
        }
        if next == BookingStatus::CheckedOut {
            active.actual_pick_up_time = Set(Some(now));
        }
        if next == BookingStatus::Cancelled {
            active.cancelled_at = Set(Some(now));
        }

        let booking = active.update(conn).await.map_err(ServiceError::db_error)?;
        info!(
            booking_id = %booking.id,
            from = %previous,
            to = %next,
            "Booking status changed"
        );

        Ok(TransitionOutcome {
            booking,
            previous,
            changed: true,
        })
    }

    /// Single listener for domain events that can move a booking.
    #[instrument(skip(self, conn))]
    pub async fn handle<C: ConnectionTrait>(
        &self,
        conn: &C,
        event: &DomainEvent,
    ) -> Result<Option<TransitionOutcome>, ServiceError> {
        match event {
            DomainEvent::AddonStatusChanged {
                booking_id,
                new_status,
                ..
            } => {
                if !new_status.is_settled() {
                    return Ok(None);
                }

                let booking = BookingEntity::find_by_id(*booking_id)
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Booking {} not found", booking_id))
                    })?;

                let addons: Vec<AddonStatus> = BookingAddonEntity::find()
                    .filter(booking_addon::Column::BookingId.eq(*booking_id))
                    .all(conn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .into_iter()
                    .map(|addon| addon.status)
                    .collect();

                match auto_advance_target(booking.status, &addons) {
                    Some(target) => {
                        info!(booking_id = %booking_id, "All addons settled, advancing booking");
                        self.transition(conn, booking, target).await.map(Some)
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::VehicleType;
    use chrono::Duration;

    fn booking(status: BookingStatus, drop_off: DateTime<Utc>) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            reference: "PK-ABC234".into(),
            lot_id: Uuid::new_v4(),
            vehicle_type: VehicleType::Small,
            license_plate: "AB123".into(),
            vehicle_make: None,
            vehicle_model: None,
            customer_name: "Anna".into(),
            customer_email: "anna@example.com".into(),
            customer_phone: None,
            drop_off_time: drop_off,
            pick_up_time: drop_off + Duration::days(3),
            actual_drop_off_time: None,
            actual_pick_up_time: None,
            departure_flight: None,
            arrival_flight: None,
            status,
            total_days: 3,
            daily_rate: 1000,
            discount_amount: 0,
            addons_total: 0,
            total_price: 3000,
            currency: "ISK".into(),
            spot_number: None,
            notes: None,
            reminder_sent_at: None,
            cancelled_at: None,
            created_at: drop_off - Duration::days(10),
            updated_at: None,
        }
    }

    #[test]
    fn advances_only_from_in_progress() {
        let settled = [AddonStatus::Completed, AddonStatus::Skipped];
        assert_eq!(
            auto_advance_target(BookingStatus::InProgress, &settled),
            Some(BookingStatus::Ready)
        );
        assert_eq!(auto_advance_target(BookingStatus::Confirmed, &settled), None);
        assert_eq!(auto_advance_target(BookingStatus::Cancelled, &settled), None);
        assert_eq!(auto_advance_target(BookingStatus::Ready, &settled), None);
    }

    #[test]
    fn waits_for_every_addon() {
        let mixed = [AddonStatus::Completed, AddonStatus::Pending];
        assert_eq!(auto_advance_target(BookingStatus::InProgress, &mixed), None);
    }

    #[test]
    fn customer_cancel_rules() {
        let now = Utc::now();
        let future = now + Duration::days(2);

        assert!(ensure_customer_can_cancel(&booking(BookingStatus::Confirmed, future), now).is_ok());

        for status in [
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ] {
            assert!(matches!(
                ensure_customer_can_cancel(&booking(status, future), now),
                Err(ServiceError::CannotCancel(_))
            ));
        }

        let past = now - Duration::hours(1);
        assert!(matches!(
            ensure_customer_can_cancel(&booking(BookingStatus::Confirmed, past), now),
            Err(ServiceError::CannotCancel(_))
        ));
    }
}
