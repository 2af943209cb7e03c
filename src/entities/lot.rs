use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A physical parking facility
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Lot)]
#[sea_orm(table_name = "lots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    /// Default display name
    pub name: String,
    /// Localized display names keyed by locale, e.g. `{"is": "Langtímastæði"}`
    #[schema(value_type = Option<Object>)]
    pub names: Option<Json>,
    pub address: Option<String>,
    pub total_spaces: i32,
    pub is_active: bool,
    #[serde(skip)]
    pub hold_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Resolves the display name for a locale, falling back to the default name.
    pub fn display_name(&self, locale: Option<&str>) -> String {
        locale
            .and_then(|loc| {
                self.names
                    .as_ref()
                    .and_then(|names| names.get(loc))
                    .and_then(|v| v.as_str())
            })
            .map(str::to_string)
            .unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
    #[sea_orm(has_many = "super::lot_pricing::Entity")]
    Pricing,
    #[sea_orm(has_many = "super::spot_hold::Entity")]
    SpotHolds,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::lot_pricing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pricing.def()
    }
}

impl Related<super::spot_hold::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SpotHolds.def()
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
    use super::*;
    use serde_json::json;

    fn lot(names: Option<Json>) -> Model {
        Model {
            id: Uuid::new_v4(),
            code: "KEF-P1".into(),
            name: "Long-term parking".into(),
            names,
            address: None,
            total_spaces: 10,
            is_active: true,
            hold_version: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn display_name_falls_back_to_default() {
        let lot = lot(Some(json!({"is": "Langtímastæði"})));
        assert_eq!(lot.display_name(Some("is")), "Langtímastæði");
        assert_eq!(lot.display_name(Some("de")), "Long-term parking");
        assert_eq!(lot.display_name(None), "Long-term parking");
    }
}
