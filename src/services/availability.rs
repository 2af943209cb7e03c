use crate::{
    common::SharedClock,
    db::DbPool,
    entities::{
        booking::{self, Entity as BookingEntity},
        lot::{self, Entity as LotEntity},
        BookingStatus,
    },
    errors::ServiceError,
    services::spot_holds::SpotHoldStore,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// `max(0, capacity - taken)`
pub fn available_spaces(capacity: i32, taken: u64) -> i64 {
    let taken = i64::try_from(taken).unwrap_or(i64::MAX);
    (i64::from(capacity) - taken).max(0)
}

/// Bookings in an active status whose `[drop_off, pick_up]` contains `at`.
pub async fn count_occupying_bookings<C: ConnectionTrait>(
    conn: &C,
    lot_id: Uuid,
    at: DateTime<Utc>,
) -> Result<u64, ServiceError> {
    BookingEntity::find()
        .filter(booking::Column::LotId.eq(lot_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .filter(booking::Column::DropOffTime.lte(at))
        .filter(booking::Column::PickUpTime.gte(at))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Bookings in an active status overlapping the closed interval `[start, end]`.
pub async fn count_overlapping_bookings<C: ConnectionTrait>(
    conn: &C,
    lot_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u64, ServiceError> {
    BookingEntity::find()
        .filter(booking::Column::LotId.eq(lot_id))
        .filter(booking::Column::Status.is_in(BookingStatus::ACTIVE))
        .filter(booking::Column::DropOffTime.lte(end))
        .filter(booking::Column::PickUpTime.gte(start))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Bumps the lot's hold version, which takes the row lock for the rest of the
/// transaction. Every capacity check-then-write on a lot goes through here first.
pub async fn lock_lot<C: ConnectionTrait>(conn: &C, lot_id: Uuid) -> Result<lot::Model, ServiceError> {
    let result = LotEntity::update_many()
        .col_expr(
            lot::Column::HoldVersion,
            Expr::col(lot::Column::HoldVersion).add(1),
        )
        .filter(lot::Column::Id.eq(lot_id))
        .filter(lot::Column::IsActive.eq(true))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Lot {} not found or inactive",
            lot_id
        )));
    }

    LotEntity::find_by_id(lot_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))
}

/// Point-in-time availability of one lot
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LotAvailability {
    pub lot_id: Uuid,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub total_spaces: i32,
    pub occupied_spaces: u64,
    pub available_spaces: i64,
    pub as_of: DateTime<Utc>,
}

/// Availability of one lot over a date range, counting live spot holds
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RangeAvailability {
    pub lot_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_spaces: i32,
    pub booked_spaces: u64,
    pub held_spaces: u64,
    pub available_spaces: i64,
}

#[derive(Clone)]
pub struct AvailabilityService {
    db: Arc<DbPool>,
    clock: SharedClock,
    holds: Arc<dyn SpotHoldStore>,
}

impl AvailabilityService {
    pub fn new(db: Arc<DbPool>, clock: SharedClock, holds: Arc<dyn SpotHoldStore>) -> Self {
        Self { db, clock, holds }
    }

    /// Snapshot for every active lot, evaluated at the current instant.
    #[instrument(skip(self))]
    pub async fn list_active_lots(
        &self,
        locale: Option<&str>,
    ) -> Result<Vec<LotAvailability>, ServiceError> {
        let now = self.clock.now();
        let lots = LotEntity::find()
            .filter(lot::Column::IsActive.eq(true))
            .order_by_asc(lot::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut snapshots = Vec::with_capacity(lots.len());
        for lot in lots {
            let occupied = count_occupying_bookings(&*self.db, lot.id, now).await?;
            snapshots.push(LotAvailability {
                lot_id: lot.id,
                name: lot.display_name(locale),
                code: lot.code.clone(),
                address: lot.address.clone(),
                total_spaces: lot.total_spaces,
                occupied_spaces: occupied,
                available_spaces: available_spaces(lot.total_spaces, occupied),
                as_of: now,
            });
        }
        Ok(snapshots)
    }

    #[instrument(skip(self))]
    pub async fn lot_snapshot(
        &self,
        lot_id: Uuid,
        locale: Option<&str>,
    ) -> Result<LotAvailability, ServiceError> {
        let now = self.clock.now();
        let lot = LotEntity::find_by_id(lot_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))?;

        let occupied = count_occupying_bookings(&*self.db, lot.id, now).await?;
        Ok(LotAvailability {
            lot_id: lot.id,
            name: lot.display_name(locale),
            code: lot.code.clone(),
            address: lot.address.clone(),
            total_spaces: lot.total_spaces,
            occupied_spaces: occupied,
            available_spaces: available_spaces(lot.total_spaces, occupied),
            as_of: now,
        })
    }

    /// Capacity minus overlapping active bookings minus overlapping live holds.
    #[instrument(skip(self))]
    pub async fn range(
        &self,
        lot_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RangeAvailability, ServiceError> {
        if end < start {
            return Err(ServiceError::ValidationError(
                "end must not be before start".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let lot = LotEntity::find_by_id(lot_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))?;
        let booked = count_overlapping_bookings(&txn, lot_id, start, end).await?;
        let held = self
            .holds
            .count_overlapping(&txn, lot_id, start, end, None)
            .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok(RangeAvailability {
            lot_id,
            start,
            end,
            total_spaces: lot.total_spaces,
            booked_spaces: booked,
            held_spaces: held,
            available_spaces: available_spaces(lot.total_spaces, booked + held),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn full_lot_reports_zero() {
        assert_eq!(available_spaces(10, 3), 7);
        assert_eq!(available_spaces(1, 1), 0);
        assert_eq!(available_spaces(1, 5), 0);
        assert_eq!(available_spaces(0, 0), 0);
    }

    proptest! {
        #[test]
        fn never_negative(capacity in 0i32..10_000, taken in 0u64..50_000) {
            let available = available_spaces(capacity, taken);
            prop_assert!(available >= 0);
            prop_assert!(available <= i64::from(capacity));
            prop_assert_eq!(available, (i64::from(capacity) - taken as i64).max(0));
        }
    }
}
