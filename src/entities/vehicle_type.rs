use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Size classification used for pricing tiers
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum VehicleType {
    #[sea_orm(string_value = "small")]
    Small,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "large")]
    Large,
    #[sea_orm(string_value = "xlarge")]
    Xlarge,
}

impl VehicleType {
    /// Maps a registry record to a size category. Light commercial vehicles are
    /// always `Xlarge`; an unknown mass falls back to `Medium`.
    pub fn from_registry(mass_kg: Option<u32>, light_commercial: bool) -> Self {
        if light_commercial {
            return VehicleType::Xlarge;
        }
        match mass_kg {
            None => VehicleType::Medium,
            Some(m) if m < 1300 => VehicleType::Small,
            Some(m) if m < 1600 => VehicleType::Medium,
            Some(m) if m < 2000 => VehicleType::Large,
            Some(_) => VehicleType::Xlarge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(Some(1000), false, VehicleType::Small)]
    #[case(Some(1299), false, VehicleType::Small)]
    #[case(Some(1300), false, VehicleType::Medium)]
    #[case(Some(1599), false, VehicleType::Medium)]
    #[case(Some(1600), false, VehicleType::Large)]
    #[case(Some(1999), false, VehicleType::Large)]
    #[case(Some(2000), false, VehicleType::Xlarge)]
    #[case(None, false, VehicleType::Medium)]
    #[case(Some(900), true, VehicleType::Xlarge)]
    fn maps_mass_to_size(
        #[case] mass: Option<u32>,
        #[case] light_commercial: bool,
        #[case] expected: VehicleType,
    ) {
        assert_eq!(VehicleType::from_registry(mass, light_commercial), expected);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(VehicleType::from_str("XLarge").unwrap(), VehicleType::Xlarge);
        assert_eq!(VehicleType::Small.to_string(), "small");
        assert!(VehicleType::from_str("bus").is_err());
    }
}
