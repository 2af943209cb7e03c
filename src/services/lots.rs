use crate::{
    common::SharedClock,
    db::DbPool,
    entities::{
        booking::{self, Entity as BookingEntity},
        lot::{self, Entity as LotEntity},
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLotRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Display names by locale
    pub names: Option<HashMap<String, String>>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = 0))]
    pub total_spaces: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateLotRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub names: Option<HashMap<String, String>>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = 0))]
    pub total_spaces: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LotRemoval {
    Deleted,
    /// Bookings reference the lot, so it was switched off instead
    Deactivated,
}

fn names_json(names: HashMap<String, String>) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(names)
        .map_err(|e| ServiceError::InternalError(format!("failed to encode lot names: {}", e)))
}

#[derive(Clone)]
pub struct LotService {
    db: Arc<DbPool>,
    clock: SharedClock,
}

impl LotService {
    pub fn new(db: Arc<DbPool>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(&self, request: CreateLotRequest) -> Result<lot::Model, ServiceError> {
        request.validate()?;
        let code = request.code.trim().to_uppercase();

        let existing = LotEntity::find()
            .filter(lot::Column::Code.eq(code.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "a lot with code {} already exists",
                code
            )));
        }

        let names = request.names.map(names_json).transpose()?;
        let lot = lot::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(request.name.trim().to_string()),
            names: Set(names),
            address: Set(request.address),
            total_spaces: Set(request.total_spaces),
            is_active: Set(request.is_active.unwrap_or(true)),
            hold_version: Set(0),
            created_at: Set(self.clock.now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(lot_id = %lot.id, "Lot created");
        Ok(lot)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        lot_id: Uuid,
        request: UpdateLotRequest,
    ) -> Result<lot::Model, ServiceError> {
        request.validate()?;
        let lot = self.get(lot_id).await?;

        let mut active: lot::ActiveModel = lot.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(names) = request.names {
            active.names = Set(Some(names_json(names)?));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address).filter(|a| !a.trim().is_empty()));
        }
        if let Some(total_spaces) = request.total_spaces {
            active.total_spaces = Set(total_spaces);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let lot = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(lot_id = %lot.id, "Lot updated");
        Ok(lot)
    }

    pub async fn get(&self, lot_id: Uuid) -> Result<lot::Model, ServiceError> {
        LotEntity::find_by_id(lot_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", lot_id)))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<lot::Model>, ServiceError> {
        let mut query = LotEntity::find();
        if !include_inactive {
            query = query.filter(lot::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(lot::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Removes a lot, or deactivates it when any booking references it.
    #[instrument(skip(self))]
    pub async fn remove(&self, lot_id: Uuid) -> Result<LotRemoval, ServiceError> {
        let lot = self.get(lot_id).await?;
        let referenced = BookingEntity::find()
            .filter(booking::Column::LotId.eq(lot_id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if referenced > 0 {
            let mut active: lot::ActiveModel = lot.into();
            active.is_active = Set(false);
            active
                .update(&*self.db)
                .await
                .map_err(ServiceError::db_error)?;
            info!(lot_id = %lot_id, bookings = referenced, "Lot deactivated");
            return Ok(LotRemoval::Deactivated);
        }

        LotEntity::delete_by_id(lot_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(lot_id = %lot_id, "Lot deleted");
        Ok(LotRemoval::Deleted)
    }
}
