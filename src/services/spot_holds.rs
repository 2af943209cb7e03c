//! Temporary capacity holds for checkout sessions.
//!
//! A hold claims one space of a lot for a closed interval while the customer
//! finishes checkout. It counts against capacity only until `expires_at`;
//! expiry is evaluated lazily on every read and count, so a sweeper is only
//! needed to bound storage.
//!
//! Every reserve runs in a transaction that first locks the lot row (see
//! [`lock_lot`]), so two sessions can never both see the last space free.

use crate::{
    common::SharedClock,
    db::DbPool,
    entities::spot_hold::{self, Entity as SpotHoldEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::availability::{available_spaces, count_overlapping_bookings, lock_lot},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_SESSION_ID_LEN: usize = 128;

/// A live hold as seen by the session that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SpotHold {
    pub session_id: String,
    pub lot_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
}

impl SpotHold {
    fn from_record(record: &HoldRecord, now: DateTime<Utc>) -> Self {
        Self {
            session_id: record.session_id.clone(),
            lot_id: record.lot_id,
            start_time: record.start_time,
            end_time: record.end_time,
            expires_at: record.expires_at,
            remaining_seconds: (record.expires_at - now).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HoldRecord {
    session_id: String,
    lot_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl HoldRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time <= end && self.end_time >= start
    }
}

impl From<spot_hold::Model> for HoldRecord {
    fn from(model: spot_hold::Model) -> Self {
        Self {
            session_id: model.session_id,
            lot_id: model.lot_id,
            start_time: model.start_time,
            end_time: model.end_time,
            expires_at: model.expires_at,
        }
    }
}

/// Storage for spot holds.
///
/// `count_overlapping` and `release_in` take the caller's transaction so that
/// booking creation can check capacity and consume the session's hold in the
/// same unit of work as the booking insert.
#[async_trait]
pub trait SpotHoldStore: Send + Sync {
    /// Claims a space for `session_id`, replacing any earlier hold of that session.
    async fn reserve(
        &self,
        session_id: &str,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SpotHold, ServiceError>;

    /// Re-runs `reserve` with the session's stored parameters. Availability is
    /// checked again, so an extension can fail with `NoSpotsAvailable`.
    async fn extend(&self, session_id: &str) -> Result<SpotHold, ServiceError>;

    /// Drops the session's hold. Returns whether one existed.
    async fn release(&self, session_id: &str) -> Result<bool, ServiceError>;

    /// The session's hold, if it has not expired.
    async fn get(&self, session_id: &str) -> Result<Option<SpotHold>, ServiceError>;

    /// Live holds on `lot_id` overlapping `[start, end]`, optionally ignoring one session.
    async fn count_overlapping(
        &self,
        txn: &DatabaseTransaction,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<u64, ServiceError>;

    /// Drops the session's hold as part of the caller's transaction.
    async fn release_in(&self, txn: &DatabaseTransaction, session_id: &str)
        -> Result<(), ServiceError>;

    /// Deletes expired holds; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, ServiceError>;
}

/// Settings shared by both stores
#[derive(Clone)]
pub struct HoldSettings {
    pub ttl: Duration,
}

impl HoldSettings {
    pub fn from_secs(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
        }
    }
}

fn validate_hold_request(
    session_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if session_id.trim().is_empty() || session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ServiceError::ValidationError(format!(
            "session id must be 1-{} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if end < start {
        return Err(ServiceError::ValidationError(
            "hold end must not be before its start".to_string(),
        ));
    }
    Ok(())
}

fn no_spots(lot_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> ServiceError {
    counter!("airpark.spot_holds.rejected", 1);
    ServiceError::NoSpotsAvailable(format!(
        "lot {} is full between {} and {}",
        lot_id,
        start.to_rfc3339(),
        end.to_rfc3339()
    ))
}

async fn publish(events: &Option<Arc<EventSender>>, event: Event) {
    if let Some(sender) = events {
        sender.send_or_log(event).await;
    }
}

/// Holds stored in the `spot_holds` table. Safe across processes.
#[derive(Clone)]
pub struct DatabaseSpotHoldStore {
    db: Arc<DbPool>,
    clock: SharedClock,
    settings: HoldSettings,
    events: Option<Arc<EventSender>>,
}

impl DatabaseSpotHoldStore {
    pub fn new(
        db: Arc<DbPool>,
        clock: SharedClock,
        settings: HoldSettings,
        events: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            clock,
            settings,
            events,
        }
    }

    async fn find_record(&self, session_id: &str) -> Result<Option<HoldRecord>, ServiceError> {
        Ok(SpotHoldEntity::find_by_id(session_id.to_string())
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .map(HoldRecord::from))
    }
}

#[async_trait]
impl SpotHoldStore for DatabaseSpotHoldStore {
    #[instrument(skip(self))]
    async fn reserve(
        &self,
        session_id: &str,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SpotHold, ServiceError> {
        validate_hold_request(session_id, start, end)?;
        let now = self.clock.now();

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let lot = lock_lot(&txn, lot_id).await?;

        let booked = count_overlapping_bookings(&txn, lot_id, start, end).await?;
        let held = self
            .count_overlapping(&txn, lot_id, start, end, Some(session_id))
            .await?;

        if available_spaces(lot.total_spaces, booked + held) <= 0 {
            debug!(booked, held, capacity = lot.total_spaces, "Hold rejected");
            return Err(no_spots(lot_id, start, end));
        }

        SpotHoldEntity::delete_by_id(session_id.to_string())
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let expires_at = now + self.settings.ttl;
        let model = spot_hold::ActiveModel {
            session_id: Set(session_id.to_string()),
            lot_id: Set(lot_id),
            start_time: Set(start),
            end_time: Set(end),
            expires_at: Set(expires_at),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("airpark.spot_holds.granted", 1);
        info!(session_id, lot_id = %lot_id, expires_at = %expires_at, "Spot hold granted");
        publish(
            &self.events,
            Event::SpotHoldGranted {
                session_id: session_id.to_string(),
                lot_id,
                expires_at,
            },
        )
        .await;

        Ok(SpotHold::from_record(&HoldRecord::from(model), now))
    }

    #[instrument(skip(self))]
    async fn extend(&self, session_id: &str) -> Result<SpotHold, ServiceError> {
        let record = self.find_record(session_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("No spot hold for session {}", session_id))
        })?;
        self.reserve(session_id, record.lot_id, record.start_time, record.end_time)
            .await
    }

    #[instrument(skip(self))]
    async fn release(&self, session_id: &str) -> Result<bool, ServiceError> {
        let result = SpotHoldEntity::delete_by_id(session_id.to_string())
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let released = result.rows_affected > 0;
        if released {
            info!(session_id, "Spot hold released");
            publish(
                &self.events,
                Event::SpotHoldReleased {
                    session_id: session_id.to_string(),
                },
            )
            .await;
        }
        Ok(released)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SpotHold>, ServiceError> {
        let now = self.clock.now();
        Ok(self
            .find_record(session_id)
            .await?
            .filter(|record| record.is_live(now))
            .map(|record| SpotHold::from_record(&record, now)))
    }

    async fn count_overlapping(
        &self,
        txn: &DatabaseTransaction,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<u64, ServiceError> {
        let mut query = SpotHoldEntity::find()
            .filter(spot_hold::Column::LotId.eq(lot_id))
            .filter(spot_hold::Column::ExpiresAt.gt(self.clock.now()))
            .filter(spot_hold::Column::StartTime.lte(end))
            .filter(spot_hold::Column::EndTime.gte(start));
        if let Some(session_id) = exclude_session {
            query = query.filter(spot_hold::Column::SessionId.ne(session_id));
        }
        query.count(txn).await.map_err(ServiceError::db_error)
    }

    async fn release_in(
        &self,
        txn: &DatabaseTransaction,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        SpotHoldEntity::delete_by_id(session_id.to_string())
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let result = SpotHoldEntity::delete_many()
            .filter(spot_hold::Column::ExpiresAt.lte(self.clock.now()))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }
}

/// Holds kept in process memory.
///
/// Capacity checks still lock the lot row, so holds and bookings made by this
/// process are serialized correctly. Holds are invisible to other processes:
/// run a single instance when using this store.
#[derive(Clone)]
pub struct InMemorySpotHoldStore {
    db: Arc<DbPool>,
    clock: SharedClock,
    settings: HoldSettings,
    events: Option<Arc<EventSender>>,
    holds: Arc<Mutex<HashMap<String, HoldRecord>>>,
}

impl InMemorySpotHoldStore {
    pub fn new(
        db: Arc<DbPool>,
        clock: SharedClock,
        settings: HoldSettings,
        events: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            clock,
            settings,
            events,
            holds: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn count_live(
        &self,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> u64 {
        let now = self.clock.now();
        let holds = self.holds.lock().await;
        holds
            .values()
            .filter(|h| h.lot_id == lot_id && h.is_live(now) && h.overlaps(start, end))
            .filter(|h| exclude_session != Some(h.session_id.as_str()))
            .count() as u64
    }
}

#[async_trait]
impl SpotHoldStore for InMemorySpotHoldStore {
    #[instrument(skip(self))]
    async fn reserve(
        &self,
        session_id: &str,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SpotHold, ServiceError> {
        validate_hold_request(session_id, start, end)?;
        let now = self.clock.now();

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let lot = lock_lot(&txn, lot_id).await?;
        let booked = count_overlapping_bookings(&txn, lot_id, start, end).await?;

        let mut holds = self.holds.lock().await;
        let held = holds
            .values()
            .filter(|h| h.lot_id == lot_id && h.is_live(now) && h.overlaps(start, end))
            .filter(|h| h.session_id != session_id)
            .count() as u64;

        if available_spaces(lot.total_spaces, booked + held) <= 0 {
            debug!(booked, held, capacity = lot.total_spaces, "Hold rejected");
            return Err(no_spots(lot_id, start, end));
        }

        let record = HoldRecord {
            session_id: session_id.to_string(),
            lot_id,
            start_time: start,
            end_time: end,
            expires_at: now + self.settings.ttl,
        };

        // Recorded only after a successful commit.
        txn.commit().await.map_err(ServiceError::db_error)?;
        holds.insert(session_id.to_string(), record.clone());
        drop(holds);

        counter!("airpark.spot_holds.granted", 1);
        info!(session_id, lot_id = %lot_id, expires_at = %record.expires_at, "Spot hold granted");
        publish(
            &self.events,
            Event::SpotHoldGranted {
                session_id: session_id.to_string(),
                lot_id,
                expires_at: record.expires_at,
            },
        )
        .await;

        Ok(SpotHold::from_record(&record, now))
    }

    #[instrument(skip(self))]
    async fn extend(&self, session_id: &str) -> Result<SpotHold, ServiceError> {
        let record = self
            .holds
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No spot hold for session {}", session_id))
            })?;
        self.reserve(session_id, record.lot_id, record.start_time, record.end_time)
            .await
    }

    #[instrument(skip(self))]
    async fn release(&self, session_id: &str) -> Result<bool, ServiceError> {
        let released = self.holds.lock().await.remove(session_id).is_some();
        if released {
            info!(session_id, "Spot hold released");
            publish(
                &self.events,
                Event::SpotHoldReleased {
                    session_id: session_id.to_string(),
                },
            )
            .await;
        }
        Ok(released)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SpotHold>, ServiceError> {
        let now = self.clock.now();
        Ok(self
            .holds
            .lock()
            .await
            .get(session_id)
            .filter(|record| record.is_live(now))
            .map(|record| SpotHold::from_record(record, now)))
    }

    async fn count_overlapping(
        &self,
        _txn: &DatabaseTransaction,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_session: Option<&str>,
    ) -> Result<u64, ServiceError> {
        Ok(self.count_live(lot_id, start, end, exclude_session).await)
    }

    // Not rolled back with the transaction: a failed booking insert loses the hold.
    async fn release_in(
        &self,
        _txn: &DatabaseTransaction,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        self.holds.lock().await.remove(session_id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let now = self.clock.now();
        let mut holds = self.holds.lock().await;
        let before = holds.len();
        holds.retain(|_, record| record.is_live(now));
        Ok((before - holds.len()) as u64)
    }
}

/// Periodically purges expired holds. Correctness never depends on this task.
pub fn spawn_hold_sweeper(
    store: Arc<dyn SpotHoldStore>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired spot holds"),
                Err(ServiceError::DatabaseError(e)) => {
                    error!(error = %e, "Failed to purge expired spot holds")
                }
                Err(e) => warn!(error = %e, "Failed to purge expired spot holds"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(session: &str, start_day: u32, end_day: u32, expires_at: DateTime<Utc>) -> HoldRecord {
        HoldRecord {
            session_id: session.into(),
            lot_id: Uuid::nil(),
            start_time: Utc.with_ymd_and_hms(2024, 6, start_day, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 6, end_day, 23, 59, 59).unwrap(),
            expires_at,
        }
    }

    #[test]
    fn closed_intervals_overlap_at_the_edges() {
        let now = Utc::now();
        let hold = record("a", 1, 3, now);
        let day = |d, h, m, s| Utc.with_ymd_and_hms(2024, 6, d, h, m, s).unwrap();
        assert!(hold.overlaps(day(3, 23, 59, 59), day(5, 0, 0, 0)));
        assert!(hold.overlaps(day(2, 0, 0, 0), day(2, 1, 0, 0)));
        assert!(!hold.overlaps(day(4, 0, 0, 0), day(5, 0, 0, 0)));
    }

    #[test]
    fn holds_expire_at_their_deadline() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let hold = record("a", 1, 3, now + Duration::seconds(1));
        assert!(hold.is_live(now));
        assert!(!hold.is_live(now + Duration::seconds(1)));

        let view = SpotHold::from_record(&hold, now);
        assert_eq!(view.remaining_seconds, 1);
        assert_eq!(SpotHold::from_record(&hold, now + Duration::hours(1)).remaining_seconds, 0);
    }

    #[test]
    fn rejects_bad_requests() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(validate_hold_request("", start, start).is_err());
        assert!(validate_hold_request(&"x".repeat(129), start, start).is_err());
        assert!(validate_hold_request("s", start, start - Duration::seconds(1)).is_err());
        assert!(validate_hold_request("s", start, start).is_ok());
    }
}
