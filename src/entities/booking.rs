use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::vehicle_type::VehicleType;

/// Booking status.
///
/// The main chain is `CONFIRMED -> CHECKED_IN -> IN_PROGRESS -> READY -> CHECKED_OUT`.
/// `CANCELLED` and `NO_SHOW` branch off any non-terminal state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BookingStatus {
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "CHECKED_IN")]
    CheckedIn,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "READY")]
    Ready,
    #[sea_orm(string_value = "CHECKED_OUT")]
    CheckedOut,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "NO_SHOW")]
    NoShow,
}

impl BookingStatus {
    /// Statuses that occupy a space
    pub const ACTIVE: [BookingStatus; 4] = [
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
        BookingStatus::InProgress,
        BookingStatus::Ready,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedOut | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Position on the main chain; `None` for the cancellation branches.
    fn rank(self) -> Option<u8> {
        match self {
            BookingStatus::Confirmed => Some(0),
            BookingStatus::CheckedIn => Some(1),
            BookingStatus::InProgress => Some(2),
            BookingStatus::Ready => Some(3),
            BookingStatus::CheckedOut => Some(4),
            BookingStatus::Cancelled | BookingStatus::NoShow => None,
        }
    }

    /// Whether `self -> next` is allowed. A same-status move is always allowed
    /// (and treated as a no-op by callers).
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

/// A reservation of one vehicle in one lot for a time range
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Booking)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reference: String,
    pub lot_id: Uuid,
    pub vehicle_type: VehicleType,
    pub license_plate: String,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub drop_off_time: DateTime<Utc>,
    pub pick_up_time: DateTime<Utc>,
    pub actual_drop_off_time: Option<DateTime<Utc>>,
    pub actual_pick_up_time: Option<DateTime<Utc>>,
    pub departure_flight: Option<String>,
    pub arrival_flight: Option<String>,
    pub status: BookingStatus,
    pub total_days: i32,
    pub daily_rate: i64,
    pub discount_amount: i64,
    pub addons_total: i64,
    pub total_price: i64,
    pub currency: String,
    pub spot_number: Option<String>,
    pub notes: Option<String>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lot::Entity",
        from = "Column::LotId",
        to = "super::lot::Column::Id"
    )]
    Lot,
    #[sea_orm(has_many = "super::booking_addon::Entity")]
    Addons,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl Related<super::booking_addon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addons.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(Some(Utc::now()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;
    use super::*;
    use std::str::FromStr;

    #[test]
    fn forward_moves_and_skips_are_allowed() {
        assert!(Confirmed.can_transition_to(CheckedIn));
        assert!(CheckedIn.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Ready));
        assert!(Ready.can_transition_to(CheckedOut));
        assert!(CheckedIn.can_transition_to(CheckedOut));
    }

    #[test]
    fn backward_moves_are_rejected() {
        assert!(!Ready.can_transition_to(InProgress));
        assert!(!CheckedIn.can_transition_to(Confirmed));
    }

    #[test]
    fn cancellation_branches_from_non_terminal_states_only() {
        for status in BookingStatus::ACTIVE {
            assert!(status.can_transition_to(Cancelled));
            assert!(status.can_transition_to(NoShow));
        }
        for terminal in [CheckedOut, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Confirmed));
            assert!(!terminal.can_transition_to(Ready));
        }
        assert!(!Cancelled.can_transition_to(NoShow));
    }

    #[test]
    fn same_status_is_allowed() {
        assert!(Cancelled.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Ready));
    }

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(BookingStatus::from_str("checked_out").unwrap(), CheckedOut);
        assert_eq!(
            serde_json::to_value(NoShow).unwrap(),
            serde_json::json!("NO_SHOW")
        );
    }
}
