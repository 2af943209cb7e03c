//! Booking creation, customer self-service and the operator workflow.

use crate::{
    common::{normalize_plate, parse_date, end_of_day, start_of_day, SharedClock},
    db::DbPool,
    entities::{
        booking::{self, Entity as BookingEntity},
        booking_addon::{self, Entity as BookingAddonEntity},
        lot::{self, Entity as LotEntity},
        payment,
        service_offering::{self, Entity as ServiceOfferingEntity},
        AddonStatus, BookingStatus, VehicleType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        availability::{available_spaces, count_overlapping_bookings, lock_lot},
        booking_lifecycle::{ensure_customer_can_cancel, BookingLifecycle, TransitionOutcome},
        flights::normalize_flight_number,
        notifications::{DeliveryOutcome, NotificationService},
        payments::{latest_payment, PaymentService, RefundOutcome},
        pricing::{compute_quote, find_active_pricing, PriceQuote},
        spot_holds::SpotHoldStore,
    },
};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const REFERENCE_PREFIX: &str = "PK-";
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_LEN: usize = 6;
const REFERENCE_ATTEMPTS: usize = 8;
const MAX_ADDONS: usize = 20;

/// A fresh `PK-XXXXXX` reference. Ambiguous characters (0/O, 1/I) are never used.
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..REFERENCE_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", REFERENCE_PREFIX, code)
}

fn normalize_reference(reference: &str) -> String {
    reference.trim().to_uppercase()
}

/// Finds a booking by reference, but only for the customer email it was made
/// with. A mismatch looks exactly like an unknown reference.
pub async fn find_customer_booking<C: ConnectionTrait>(
    conn: &C,
    reference: &str,
    email: &str,
) -> Result<booking::Model, ServiceError> {
    let reference = normalize_reference(reference);
    BookingEntity::find()
        .filter(booking::Column::Reference.eq(reference.clone()))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .filter(|b| b.customer_email.eq_ignore_ascii_case(email.trim()))
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", reference)))
}

async fn find_booking<C: ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
) -> Result<booking::Model, ServiceError> {
    BookingEntity::find_by_id(booking_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
}

fn normalize_optional_flight(value: Option<String>) -> Result<Option<String>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(flight) => normalize_flight_number(flight).map(Some),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_spot_number(spot_number: &str) -> Result<String, ServiceError> {
    let spot_number = spot_number.trim();
    if spot_number.is_empty() || spot_number.len() > 16 {
        return Err(ServiceError::ValidationError(
            "spot_number must be 1-16 characters".to_string(),
        ));
    }
    Ok(spot_number.to_string())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub lot_id: Uuid,
    pub vehicle_type: VehicleType,
    #[validate(length(min = 2, max = 16))]
    pub license_plate: String,
    #[validate(length(max = 64))]
    pub vehicle_make: Option<String>,
    #[validate(length(max = 64))]
    pub vehicle_model: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(max = 32))]
    pub customer_phone: Option<String>,
    pub drop_off_time: DateTime<Utc>,
    pub pick_up_time: DateTime<Utc>,
    pub departure_flight: Option<String>,
    pub arrival_flight: Option<String>,
    /// Service offering ids
    #[serde(default)]
    pub addon_ids: Vec<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// A booking with its addon lines and latest payment
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDetails {
    pub booking: booking::Model,
    pub addons: Vec<booking_addon::Model>,
    pub payment: Option<payment::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedBooking {
    pub booking: booking::Model,
    pub addons: Vec<booking_addon::Model>,
    pub quote: PriceQuote,
    pub confirmation_email: DeliveryOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancellationResult {
    pub booking: booking::Model,
    pub refund: Option<RefundOutcome>,
    pub cancellation_email: DeliveryOutcome,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub lot_id: Option<Uuid>,
    /// Drop-off date, `YYYY-MM-DD`
    pub date: Option<String>,
    /// Matches reference, licence plate or customer email
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailySchedule {
    pub lot_id: Uuid,
    pub date: String,
    pub arrivals: Vec<booking::Model>,
    pub departures: Vec<booking::Model>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ReminderRun {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BookingSettings {
    pub currency: String,
    pub reminder_lead: Duration,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<DbPool>,
    clock: SharedClock,
    lifecycle: BookingLifecycle,
    holds: Arc<dyn SpotHoldStore>,
    payments: Arc<PaymentService>,
    notifications: NotificationService,
    events: Arc<EventSender>,
    settings: BookingSettings,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DbPool>,
        clock: SharedClock,
        lifecycle: BookingLifecycle,
        holds: Arc<dyn SpotHoldStore>,
        payments: Arc<PaymentService>,
        notifications: NotificationService,
        events: Arc<EventSender>,
        settings: BookingSettings,
    ) -> Self {
        Self {
            db,
            clock,
            lifecycle,
            holds,
            payments,
            notifications,
            events,
            settings,
        }
    }

    /// Creates a CONFIRMED booking.
    ///
    /// Capacity is re-checked under the lot lock, ignoring the caller's own
    /// hold, and that hold is consumed in the same transaction as the insert.
    #[instrument(skip(self, request), fields(lot_id = %request.lot_id))]
    pub async fn create(
        &self,
        request: CreateBookingRequest,
        session_id: Option<&str>,
    ) -> Result<CreatedBooking, ServiceError> {
        request.validate()?;

        let license_plate = normalize_plate(&request.license_plate);
        if license_plate.len() < 2 || !license_plate.chars().all(char::is_alphanumeric) {
            return Err(ServiceError::ValidationError(
                "license_plate must contain letters and digits only".to_string(),
            ));
        }
        let departure_flight = normalize_optional_flight(request.departure_flight)?;
        let arrival_flight = normalize_optional_flight(request.arrival_flight)?;

        let now = self.clock.now();
        let (drop_off, pick_up) = (request.drop_off_time, request.pick_up_time);
        if drop_off < now {
            return Err(ServiceError::ValidationError(
                "drop-off time must not be in the past".to_string(),
            ));
        }
        if pick_up <= drop_off {
            return Err(ServiceError::ValidationError(
                "pick-up time must be after drop-off time".to_string(),
            ));
        }

        let addon_ids: BTreeSet<Uuid> = request.addon_ids.iter().copied().collect();
        if addon_ids.len() > MAX_ADDONS {
            return Err(ServiceError::ValidationError(format!(
                "at most {} services per booking",
                MAX_ADDONS
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let lot = lock_lot(&txn, request.lot_id).await?;

        let booked = count_overlapping_bookings(&txn, lot.id, drop_off, pick_up).await?;
        let held = self
            .holds
            .count_overlapping(&txn, lot.id, drop_off, pick_up, session_id)
            .await?;
        if available_spaces(lot.total_spaces, booked + held) <= 0 {
            counter!("airpark.bookings.rejected", 1);
            return Err(ServiceError::NoSpotsAvailable(format!(
                "{} is full for the selected dates",
                lot.name
            )));
        }

        let pricing = find_active_pricing(&txn, lot.id, request.vehicle_type).await?;
        let quote = compute_quote(&pricing, drop_off, pick_up)?;
        let total_days = i32::try_from(quote.days)
            .map_err(|_| ServiceError::ValidationError("stay is too long".to_string()))?;

        let offerings = if addon_ids.is_empty() {
            Vec::new()
        } else {
            ServiceOfferingEntity::find()
                .filter(service_offering::Column::Id.is_in(addon_ids.iter().copied()))
                .filter(service_offering::Column::IsActive.eq(true))
                .order_by_asc(service_offering::Column::SortOrder)
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?
        };
        if offerings.len() != addon_ids.len() {
            return Err(ServiceError::ValidationError(
                "one or more services are unknown or no longer offered".to_string(),
            ));
        }
        let addons_total: i64 = offerings.iter().map(|o| o.price).sum();

        let reference = self.unique_reference(&txn).await?;
        let booking = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(reference),
            lot_id: Set(lot.id),
            vehicle_type: Set(request.vehicle_type),
            license_plate: Set(license_plate),
            vehicle_make: Set(trimmed(request.vehicle_make)),
            vehicle_model: Set(trimmed(request.vehicle_model)),
            customer_name: Set(request.customer_name.trim().to_string()),
            customer_email: Set(request.customer_email.trim().to_lowercase()),
            customer_phone: Set(trimmed(request.customer_phone)),
            drop_off_time: Set(drop_off),
            pick_up_time: Set(pick_up),
            actual_drop_off_time: Set(None),
            actual_pick_up_time: Set(None),
            departure_flight: Set(departure_flight),
            arrival_flight: Set(arrival_flight),
            status: Set(BookingStatus::Confirmed),
            total_days: Set(total_days),
            daily_rate: Set(quote.daily_rate),
            discount_amount: Set(quote.discount_amount),
            addons_total: Set(addons_total),
            total_price: Set(quote.total + addons_total),
            currency: Set(self.settings.currency.clone()),
            spot_number: Set(None),
            notes: Set(trimmed(request.notes)),
            reminder_sent_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut addons = Vec::with_capacity(offerings.len());
        for offering in offerings {
            let addon = booking_addon::ActiveModel {
                id: Set(Uuid::new_v4()),
                booking_id: Set(booking.id),
                service_offering_id: Set(offering.id),
                name: Set(offering.name),
                price: Set(offering.price),
                status: Set(AddonStatus::Pending),
                completed_at: Set(None),
                created_at: Set(now),
                updated_at: Set(None),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
            addons.push(addon);
        }

        if let Some(session_id) = session_id {
            self.holds.release_in(&txn, session_id).await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("airpark.bookings.created", 1);
        info!(
            booking_id = %booking.id,
            reference = %booking.reference,
            total = booking.total_price,
            "Booking created"
        );
        self.events
            .send_or_log(Event::BookingCreated {
                booking_id: booking.id,
                reference: booking.reference.clone(),
                lot_id: booking.lot_id,
            })
            .await;

        let confirmation_email = self
            .notifications
            .send_confirmation(&booking, &addons, &lot.display_name(None))
            .await;

        Ok(CreatedBooking {
            booking,
            addons,
            quote,
            confirmation_email,
        })
    }

    async fn unique_reference<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ServiceError> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let candidate = generate_reference();
            let taken = BookingEntity::find()
                .filter(booking::Column::Reference.eq(candidate.clone()))
                .count(conn)
                .await
                .map_err(ServiceError::db_error)?;
            if taken == 0 {
                return Ok(candidate);
            }
        }
        error!("Could not generate a unique booking reference");
        Err(ServiceError::InternalError(
            "could not generate a booking reference".to_string(),
        ))
    }

    async fn load_details<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking: booking::Model,
    ) -> Result<BookingDetails, ServiceError> {
        let addons = BookingAddonEntity::find()
            .filter(booking_addon::Column::BookingId.eq(booking.id))
            .order_by_asc(booking_addon::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        let payment = latest_payment(conn, booking.id).await?;
        Ok(BookingDetails {
            booking,
            addons,
            payment,
        })
    }

    /// Customer lookup by reference and email.
    #[instrument(skip(self, email))]
    pub async fn find_for_customer(
        &self,
        reference: &str,
        email: &str,
    ) -> Result<BookingDetails, ServiceError> {
        let booking = find_customer_booking(&*self.db, reference, email).await?;
        self.load_details(&*self.db, booking).await
    }

    /// Customer cancellation. The refund and email run after the commit and
    /// their failures are reported, not raised.
    #[instrument(skip(self, email))]
    pub async fn cancel_by_customer(
        &self,
        reference: &str,
        email: &str,
    ) -> Result<CancellationResult, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let booking = find_customer_booking(&txn, reference, email).await?;
        ensure_customer_can_cancel(&booking, self.clock.now())?;
        let outcome = self
            .lifecycle
            .transition(&txn, booking, BookingStatus::Cancelled)
            .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        let booking = outcome.booking;
        counter!("airpark.bookings.cancelled", 1, "by" => "customer");
        self.events
            .send_or_log(Event::BookingCancelled {
                booking_id: booking.id,
                reference: booking.reference.clone(),
                by_customer: true,
            })
            .await;

        let refund = self
            .payments
            .refund_booking(booking.id, "customer_cancellation")
            .await;
        let refunded_amount = refund
            .as_ref()
            .filter(|r| r.succeeded)
            .map(|r| r.amount);
        let cancellation_email = self
            .notifications
            .send_cancellation(&booking, refunded_amount)
            .await;

        Ok(CancellationResult {
            booking,
            refund,
            cancellation_email,
        })
    }

    /// Operator listing with filters, newest drop-off first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: BookingFilter,
    ) -> Result<(Vec<booking::Model>, u64, u64, u64), ServiceError> {
        let page = filter.page.unwrap_or(1).max(1);
        let limit = filter
            .limit
            .unwrap_or(self.settings.default_page_size)
            .min(self.settings.max_page_size)
            .max(1);

        let mut query = BookingEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        if let Some(lot_id) = filter.lot_id {
            query = query.filter(booking::Column::LotId.eq(lot_id));
        }
        if let Some(date) = filter.date.as_deref() {
            let day = parse_date(date, "date")?;
            query = query
                .filter(booking::Column::DropOffTime.gte(start_of_day(day)?))
                .filter(booking::Column::DropOffTime.lte(end_of_day(day)?));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(booking::Column::Reference.contains(search.to_uppercase()))
                    .add(booking::Column::LicensePlate.contains(normalize_plate(search)))
                    .add(booking::Column::CustomerEmail.contains(search.to_lowercase())),
            );
        }

        let paginator = query
            .order_by_desc(booking::Column::DropOffTime)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total, page, limit))
    }

    #[instrument(skip(self))]
    pub async fn details(&self, booking_id: Uuid) -> Result<BookingDetails, ServiceError> {
        let booking = find_booking(&*self.db, booking_id).await?;
        self.load_details(&*self.db, booking).await
    }

    /// Arrivals and departures at a lot on one day, cancelled bookings excluded.
    #[instrument(skip(self))]
    pub async fn daily_schedule(
        &self,
        lot_id: Uuid,
        date: &str,
    ) -> Result<DailySchedule, ServiceError> {
        let day = parse_date(date, "date")?;
        let (start, end) = (start_of_day(day)?, end_of_day(day)?);

        LotEntity::find_by_id(lot_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))?;

        let base = BookingEntity::find()
            .filter(booking::Column::LotId.eq(lot_id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled));

        let arrivals = base
            .clone()
            .filter(booking::Column::DropOffTime.between(start, end))
            .order_by_asc(booking::Column::DropOffTime)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let departures = base
            .filter(booking::Column::PickUpTime.between(start, end))
            .order_by_asc(booking::Column::PickUpTime)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(DailySchedule {
            lot_id,
            date: day.to_string(),
            arrivals,
            departures,
        })
    }

    /// Operator status change through the transition table.
    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> Result<booking::Model, ServiceError> {
        self.apply_transition(booking_id, next, None).await
    }

    /// Marks the car as received, optionally assigning its spot.
    #[instrument(skip(self))]
    pub async fn check_in(
        &self,
        booking_id: Uuid,
        spot_number: Option<String>,
    ) -> Result<booking::Model, ServiceError> {
        let spot_number = trimmed(spot_number)
            .map(|spot| validate_spot_number(&spot))
            .transpose()?;
        self.apply_transition(booking_id, BookingStatus::CheckedIn, spot_number)
            .await
    }

    #[instrument(skip(self))]
    pub async fn check_out(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        self.apply_transition(booking_id, BookingStatus::CheckedOut, None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn assign_spot(
        &self,
        booking_id: Uuid,
        spot_number: String,
    ) -> Result<booking::Model, ServiceError> {
        let spot_number = validate_spot_number(&spot_number)?;

        let booking = find_booking(&*self.db, booking_id).await?;
        if booking.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "booking {} is {}",
                booking.reference, booking.status
            )));
        }

        let mut active: booking::ActiveModel = booking.into();
        active.spot_number = Set(Some(spot_number));
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn apply_transition(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
        spot_number: Option<String>,
    ) -> Result<booking::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let booking = find_booking(&txn, booking_id).await?;
        let TransitionOutcome {
            mut booking,
            previous,
            changed,
        } = self.lifecycle.transition(&txn, booking, next).await?;

        if let Some(spot) = spot_number {
            let mut active: booking::ActiveModel = booking.into();
            active.spot_number = Set(Some(spot));
            booking = active.update(&txn).await.map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        if changed {
            self.events
                .send_or_log(Event::BookingStatusChanged {
                    booking_id,
                    old_status: previous,
                    new_status: next,
                })
                .await;
            if next == BookingStatus::Cancelled {
                counter!("airpark.bookings.cancelled", 1, "by" => "operator");
                self.events
                    .send_or_log(Event::BookingCancelled {
                        booking_id,
                        reference: booking.reference.clone(),
                        by_customer: false,
                    })
                    .await;
            }
        }
        Ok(booking)
    }

    /// Emails every confirmed booking whose drop-off falls inside the reminder
    /// lead time and stamps the ones that were delivered.
    #[instrument(skip(self))]
    pub async fn send_due_reminders(&self) -> Result<ReminderRun, ServiceError> {
        let now = self.clock.now();
        let due = BookingEntity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .filter(booking::Column::ReminderSentAt.is_null())
            .filter(booking::Column::DropOffTime.gt(now))
            .filter(booking::Column::DropOffTime.lte(now + self.settings.reminder_lead))
            .order_by_asc(booking::Column::DropOffTime)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut run = ReminderRun {
            due: due.len(),
            ..ReminderRun::default()
        };

        for booking in due {
            let lot_name = LotEntity::find_by_id(booking.lot_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .map(|lot: lot::Model| lot.display_name(None))
                .unwrap_or_default();

            match self.notifications.send_reminder(&booking, &lot_name).await {
                DeliveryOutcome::Sent => {
                    let mut active: booking::ActiveModel = booking.into();
                    active.reminder_sent_at = Set(Some(now));
                    active
                        .update(&*self.db)
                        .await
                        .map_err(ServiceError::db_error)?;
                    run.sent += 1;
                }
                DeliveryOutcome::Failed => run.failed += 1,
                DeliveryOutcome::Skipped => {}
            }
        }

        if run.due > 0 {
            info!(due = run.due, sent = run.sent, failed = run.failed, "Reminder run finished");
        }
        Ok(run)
    }
}

/// Runs the reminder job on a fixed interval.
pub fn spawn_reminder_job(
    service: Arc<BookingService>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = service.send_due_reminders().await {
                warn!(error = %e, "Reminder run failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_use_the_unambiguous_alphabet() {
        for _ in 0..200 {
            let reference = generate_reference();
            assert_eq!(reference.len(), REFERENCE_PREFIX.len() + REFERENCE_LEN);
            assert!(reference.starts_with("PK-"));
            assert!(reference[3..]
                .bytes()
                .all(|b| REFERENCE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn optional_flights_are_normalized() {
        assert_eq!(normalize_optional_flight(None).unwrap(), None);
        assert_eq!(normalize_optional_flight(Some("  ".into())).unwrap(), None);
        assert_eq!(
            normalize_optional_flight(Some("fi 450".into())).unwrap(),
            Some("FI450".to_string())
        );
        assert!(normalize_optional_flight(Some("not a flight".into())).is_err());
    }
}
