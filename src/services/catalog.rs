use crate::{
    common::SharedClock,
    db::DbPool,
    entities::service_offering::{self, Entity as ServiceOfferingEntity},
    errors::ServiceError,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateServiceOfferingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateServiceOfferingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// The addon catalog. Prices here only affect bookings made afterwards.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    clock: SharedClock,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateServiceOfferingRequest,
    ) -> Result<service_offering::Model, ServiceError> {
        request.validate()?;
        let offering = service_offering::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            is_active: Set(request.is_active.unwrap_or(true)),
            sort_order: Set(request.sort_order.unwrap_or(0)),
            created_at: Set(self.clock.now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(offering_id = %offering.id, "Service offering created");
        Ok(offering)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        offering_id: Uuid,
        request: UpdateServiceOfferingRequest,
    ) -> Result<service_offering::Model, ServiceError> {
        request.validate()?;
        let offering = ServiceOfferingEntity::find_by_id(offering_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Service offering {} not found", offering_id))
            })?;

        let mut active: service_offering::ActiveModel = offering.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(sort_order) = request.sort_order {
            active.sort_order = Set(sort_order);
        }

        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn list(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<service_offering::Model>, ServiceError> {
        let mut query = ServiceOfferingEntity::find();
        if !include_inactive {
            query = query.filter(service_offering::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(service_offering::Column::SortOrder)
            .order_by_asc(service_offering::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}
