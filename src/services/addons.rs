use crate::{
    common::SharedClock,
    db::DbPool,
    entities::{
        booking,
        booking_addon::{self, Entity as BookingAddonEntity},
        AddonStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::booking_lifecycle::{BookingLifecycle, DomainEvent},
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateAddonStatusRequest {
    pub status: AddonStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddonUpdate {
    pub addon: booking_addon::Model,
    pub booking: booking::Model,
    /// The booking moved to READY because this was the last open addon
    pub booking_advanced: bool,
}

/// Operator updates to addon lines. Every change is published as
/// `AddonStatusChanged` to the booking lifecycle inside the same transaction.
#[derive(Clone)]
pub struct AddonService {
    db: Arc<DbPool>,
    clock: SharedClock,
    lifecycle: BookingLifecycle,
    events: Arc<EventSender>,
}

impl AddonService {
    pub fn new(
        db: Arc<DbPool>,
        clock: SharedClock,
        lifecycle: BookingLifecycle,
        events: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            clock,
            lifecycle,
            events,
        }
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        addon_id: Uuid,
        status: AddonStatus,
    ) -> Result<AddonUpdate, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let addon = BookingAddonEntity::find_by_id(addon_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .filter(|a| a.booking_id == booking_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Addon {} not found on booking {}",
                    addon_id, booking_id
                ))
            })?;
        let old_status = addon.status;

        let addon = if old_status == status {
            addon
        } else {
            let mut active: booking_addon::ActiveModel = addon.into();
            active.status = Set(status);
            active.completed_at = Set(match status {
                AddonStatus::Completed => Some(self.clock.now()),
                _ => None,
            });
            active.update(&txn).await.map_err(ServiceError::db_error)?
        };

        let advanced = if old_status == status {
            None
        } else {
            info!(addon_id = %addon_id, from = %old_status, to = %status, "Addon status changed");
            self.lifecycle
                .handle(
                    &txn,
                    &DomainEvent::AddonStatusChanged {
                        booking_id,
                        addon_id,
                        old_status,
                        new_status: status,
                    },
                )
                .await?
        };

        let booking = match &advanced {
            Some(outcome) => outcome.booking.clone(),
            None => booking::Entity::find_by_id(booking_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?,
        };

        txn.commit().await.map_err(ServiceError::db_error)?;

        let booking_advanced = advanced.as_ref().map(|o| o.changed).unwrap_or(false);
        if let Some(outcome) = advanced.filter(|o| o.changed) {
            self.events
                .send_or_log(Event::BookingStatusChanged {
                    booking_id,
                    old_status: outcome.previous,
                    new_status: outcome.booking.status,
                })
                .await;
        }

        Ok(AddonUpdate {
            addon,
            booking,
            booking_advanced,
        })
    }
}
