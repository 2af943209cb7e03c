use crate::{
    db::DbPool,
    entities::{
        lot,
        lot_pricing::{self, Entity as LotPricingEntity},
        VehicleType,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;
const WEEKLY_THRESHOLD_DAYS: i64 = 7;
const MONTHLY_THRESHOLD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountTier {
    Weekly,
    Monthly,
}

/// Price breakdown for one stay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    pub lot_id: Uuid,
    pub vehicle_type: VehicleType,
    pub days: i64,
    pub daily_rate: i64,
    pub subtotal: i64,
    pub discount_tier: Option<DiscountTier>,
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
    pub discount_amount: i64,
    pub total: i64,
}

/// Billable days for a stay: any partial day counts as a whole day, minimum one.
pub fn billable_days(
    drop_off: DateTime<Utc>,
    pick_up: DateTime<Utc>,
) -> Result<i64, ServiceError> {
    if pick_up <= drop_off {
        return Err(ServiceError::ValidationError(
            "pick-up time must be after drop-off time".to_string(),
        ));
    }
    let stay = pick_up - drop_off;
    let mut seconds = stay.num_seconds();
    // Sub-second remainders still start a new second.
    if stay > Duration::seconds(seconds) {
        seconds += 1;
    }
    let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    Ok(days.max(1))
}

fn configured(percent: Option<Decimal>) -> Option<Decimal> {
    percent.filter(|p| *p > Decimal::ZERO)
}

/// Picks at most one discount tier. Monthly wins from 30 days even when the
/// weekly percent is larger.
pub fn select_discount(
    days: i64,
    weekly_percent: Option<Decimal>,
    monthly_percent: Option<Decimal>,
) -> Option<(DiscountTier, Decimal)> {
    if days >= MONTHLY_THRESHOLD_DAYS {
        if let Some(pct) = configured(monthly_percent) {
            return Some((DiscountTier::Monthly, pct));
        }
    }
    if days >= WEEKLY_THRESHOLD_DAYS {
        if let Some(pct) = configured(weekly_percent) {
            return Some((DiscountTier::Weekly, pct));
        }
    }
    None
}

/// `round(subtotal * percent / 100)`, half away from zero.
pub fn discount_amount(subtotal: i64, percent: Decimal) -> Result<i64, ServiceError> {
    (Decimal::from(subtotal) * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError("discount amount out of range".to_string()))
}

/// Prices a stay against one pricing row.
pub fn compute_quote(
    pricing: &lot_pricing::Model,
    drop_off: DateTime<Utc>,
    pick_up: DateTime<Utc>,
) -> Result<PriceQuote, ServiceError> {
    let days = billable_days(drop_off, pick_up)?;
    let subtotal = pricing
        .price_per_day
        .checked_mul(days)
        .ok_or_else(|| ServiceError::ValidationError("stay is too long to price".to_string()))?;

    let discount = select_discount(
        days,
        pricing.weekly_discount_percent,
        pricing.monthly_discount_percent,
    );
    let discount_amount = match discount {
        Some((_, pct)) => discount_amount(subtotal, pct)?,
        None => 0,
    };

    Ok(PriceQuote {
        lot_id: pricing.lot_id,
        vehicle_type: pricing.vehicle_type,
        days,
        daily_rate: pricing.price_per_day,
        subtotal,
        discount_tier: discount.map(|(tier, _)| tier),
        discount_percent: discount.map(|(_, pct)| pct),
        discount_amount,
        total: subtotal - discount_amount,
    })
}

/// Loads the active pricing row for a (lot, vehicle type) pair.
pub async fn find_active_pricing<C: ConnectionTrait>(
    conn: &C,
    lot_id: Uuid,
    vehicle_type: VehicleType,
) -> Result<lot_pricing::Model, ServiceError> {
    LotPricingEntity::find()
        .filter(lot_pricing::Column::LotId.eq(lot_id))
        .filter(lot_pricing::Column::VehicleType.eq(vehicle_type))
        .filter(lot_pricing::Column::IsActive.eq(true))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::pricing_not_found(lot_id, vehicle_type))
}

/// Warnings about a discount configuration that is legal but probably unintended.
pub fn pricing_policy_warnings(
    weekly_percent: Option<Decimal>,
    monthly_percent: Option<Decimal>,
) -> Vec<String> {
    match (configured(weekly_percent), configured(monthly_percent)) {
        (Some(weekly), Some(monthly)) if monthly < weekly => vec![format!(
            "monthly discount ({}%) is smaller than weekly discount ({}%): a 30-day stay will be discounted less than a 29-day stay",
            monthly, weekly
        )],
        _ => Vec::new(),
    }
}

fn validate_percent(field: &str, value: Option<Decimal>) -> Result<(), ServiceError> {
    match value {
        Some(p) if p < Decimal::ZERO || p > Decimal::ONE_HUNDRED => Err(
            ServiceError::ValidationError(format!("{} must be between 0 and 100", field)),
        ),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpsertPricingRequest {
    pub vehicle_type: VehicleType,
    pub price_per_day: i64,
    #[schema(value_type = Option<String>)]
    pub weekly_discount_percent: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub monthly_discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricingUpsertResult {
    pub pricing: lot_pricing::Model,
    pub warnings: Vec<String>,
}

/// Quotes stays and maintains the per-lot price list
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DbPool>,
}

impl PricingService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        lot_id: Uuid,
        vehicle_type: VehicleType,
        drop_off: DateTime<Utc>,
        pick_up: DateTime<Utc>,
    ) -> Result<PriceQuote, ServiceError> {
        let pricing = find_active_pricing(&*self.db, lot_id, vehicle_type).await?;
        let quote = compute_quote(&pricing, drop_off, pick_up)?;
        counter!("airpark.pricing.quotes", 1);
        Ok(quote)
    }

    /// Active pricing rows for a lot
    #[instrument(skip(self))]
    pub async fn list_for_lot(&self, lot_id: Uuid) -> Result<Vec<lot_pricing::Model>, ServiceError> {
        LotPricingEntity::find()
            .filter(lot_pricing::Column::LotId.eq(lot_id))
            .filter(lot_pricing::Column::IsActive.eq(true))
            .order_by_asc(lot_pricing::Column::VehicleType)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Replaces the active row for (lot, vehicle type): the old row is deactivated
    /// and the new one inserted in the same transaction.
    #[instrument(skip(self, request), fields(vehicle_type = %request.vehicle_type))]
    pub async fn upsert(
        &self,
        lot_id: Uuid,
        request: UpsertPricingRequest,
    ) -> Result<PricingUpsertResult, ServiceError> {
        if request.price_per_day < 0 {
            return Err(ServiceError::ValidationError(
                "price_per_day must not be negative".to_string(),
            ));
        }
        validate_percent("weekly_discount_percent", request.weekly_discount_percent)?;
        validate_percent("monthly_discount_percent", request.monthly_discount_percent)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        lot::Entity::find_by_id(lot_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))?;

        let previous = LotPricingEntity::find()
            .filter(lot_pricing::Column::LotId.eq(lot_id))
            .filter(lot_pricing::Column::VehicleType.eq(request.vehicle_type))
            .filter(lot_pricing::Column::IsActive.eq(true))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        for row in previous {
            let mut active: lot_pricing::ActiveModel = row.into();
            active.is_active = Set(false);
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        let pricing = lot_pricing::ActiveModel {
            id: Set(Uuid::new_v4()),
            lot_id: Set(lot_id),
            vehicle_type: Set(request.vehicle_type),
            price_per_day: Set(request.price_per_day),
            weekly_discount_percent: Set(request.weekly_discount_percent),
            monthly_discount_percent: Set(request.monthly_discount_percent),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        let warnings = pricing_policy_warnings(
            pricing.weekly_discount_percent,
            pricing.monthly_discount_percent,
        );
        for warning in &warnings {
            warn!(lot_id = %lot_id, vehicle_type = %pricing.vehicle_type, "{}", warning);
        }

        info!(
            lot_id = %lot_id,
            vehicle_type = %pricing.vehicle_type,
            price_per_day = pricing.price_per_day,
            "Pricing updated"
        );

        Ok(PricingUpsertResult { pricing, warnings })
    }
}
