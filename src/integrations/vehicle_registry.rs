use super::{build_http_client, ensure_success, join_url, upstream_error};
use crate::errors::ServiceError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use utoipa::ToSchema;

const PROVIDER: &str = "vehicle_registry";

/// EU category for light commercial vehicles
pub const LIGHT_COMMERCIAL_CLASS: &str = "N1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VehicleRecord {
    pub plate: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub fuel_type: Option<String>,
    pub mass_kg: Option<u32>,
    /// Registration category, e.g. `M1` (passenger car) or `N1` (light commercial)
    pub vehicle_class: Option<String>,
}

impl VehicleRecord {
    pub fn is_light_commercial(&self) -> bool {
        self.vehicle_class
            .as_deref()
            .map(|class| class.trim().eq_ignore_ascii_case(LIGHT_COMMERCIAL_CLASS))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait VehicleRegistry: Send + Sync {
    /// `Ok(None)` when the registry has no such plate.
    async fn lookup(&self, plate: &str) -> Result<Option<VehicleRecord>, ServiceError>;
}

#[derive(Clone)]
pub struct HttpVehicleRegistry {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVehicleRegistry {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl VehicleRegistry for HttpVehicleRegistry {
    #[instrument(skip(self))]
    async fn lookup(&self, plate: &str) -> Result<Option<VehicleRecord>, ServiceError> {
        let mut request = self
            .client
            .get(join_url(&self.base_url, &format!("/vehicles/{}", plate)));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        ensure_success(PROVIDER, response)
            .await?
            .json::<VehicleRecord>()
            .await
            .map(Some)
            .map_err(|e| upstream_error(PROVIDER, e))
    }
}

/// Deterministic registry used when none is configured: the same plate always
/// yields the same record.
#[derive(Clone, Default)]
pub struct MockVehicleRegistry;

const MOCK_MODELS: &[(&str, &str, u32, &str)] = &[
    ("Toyota", "Yaris", 1090, "M1"),
    ("Volkswagen", "Golf", 1350, "M1"),
    ("Skoda", "Octavia", 1450, "M1"),
    ("Toyota", "RAV4", 1700, "M1"),
    ("Land Rover", "Defender", 2300, "M1"),
    ("Renault", "Trafic", 1850, "N1"),
];

const MOCK_COLORS: &[&str] = &["white", "black", "grey", "blue", "red"];
const MOCK_FUELS: &[&str] = &["petrol", "diesel", "electric", "hybrid"];

#[async_trait]
impl VehicleRegistry for MockVehicleRegistry {
    async fn lookup(&self, plate: &str) -> Result<Option<VehicleRecord>, ServiceError> {
        if plate.is_empty() {
            return Ok(None);
        }
        let seed = plate
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        let (make, model, mass, class) = MOCK_MODELS[seed % MOCK_MODELS.len()];
        Ok(Some(VehicleRecord {
            plate: plate.to_string(),
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            year: Some(2012 + (seed % 12) as i32),
            color: Some(MOCK_COLORS[seed % MOCK_COLORS.len()].to_string()),
            fuel_type: Some(MOCK_FUELS[seed % MOCK_FUELS.len()].to_string()),
            mass_kg: Some(mass),
            vehicle_class: Some(class.to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_registry_is_deterministic() {
        let registry = MockVehicleRegistry;
        let first = registry.lookup("AB123").await.unwrap();
        let second = registry.lookup("AB123").await.unwrap();
        assert_eq!(first, second);
        assert!(registry.lookup("").await.unwrap().is_none());
    }

    #[test]
    fn light_commercial_class_is_case_insensitive() {
        let record = VehicleRecord {
            plate: "X".into(),
            make: None,
            model: None,
            year: None,
            color: None,
            fuel_type: None,
            mass_kg: None,
            vehicle_class: Some(" n1 ".into()),
        };
        assert!(record.is_light_commercial());
    }
}
