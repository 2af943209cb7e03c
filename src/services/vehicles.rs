use crate::{
    cache::{CacheLookup, TtlCache},
    common::normalize_plate,
    entities::VehicleType,
    errors::ServiceError,
    integrations::vehicle_registry::{VehicleRecord, VehicleRegistry},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use utoipa::ToSchema;

const MAX_CACHED_PLATES: usize = 10_000;
const MAX_PLATE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VehicleSource {
    Registry,
    Cache,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VehicleLookup {
    pub plate: String,
    pub vehicle_type: VehicleType,
    pub record: VehicleRecord,
    pub source: VehicleSource,
}

impl VehicleLookup {
    fn new(plate: String, record: VehicleRecord, source: VehicleSource) -> Self {
        Self {
            vehicle_type: VehicleType::from_registry(record.mass_kg, record.is_light_commercial()),
            plate,
            record,
            source,
        }
    }
}

/// Registry lookups with a cache that doubles as the fallback when the
/// registry is down.
#[derive(Clone)]
pub struct VehicleService {
    registry: Arc<dyn VehicleRegistry>,
    cache: Arc<TtlCache<String, VehicleRecord>>,
}

impl VehicleService {
    pub fn new(registry: Arc<dyn VehicleRegistry>, cache_ttl: Duration) -> Self {
        Self {
            registry,
            cache: Arc::new(TtlCache::new(cache_ttl, MAX_CACHED_PLATES)),
        }
    }

    #[instrument(skip(self))]
    pub async fn lookup(&self, plate: &str) -> Result<VehicleLookup, ServiceError> {
        let plate = normalize_plate(plate);
        if plate.is_empty() || plate.len() > MAX_PLATE_LEN || !plate.chars().all(|c| c.is_alphanumeric()) {
            return Err(ServiceError::ValidationError(format!(
                "Invalid licence plate: {}",
                plate
            )));
        }

        let stale = match self.cache.get(&plate) {
            CacheLookup::Fresh(record) => {
                return Ok(VehicleLookup::new(plate, record, VehicleSource::Cache));
            }
            other => other.any(),
        };

        match self.registry.lookup(&plate).await {
            Ok(Some(record)) => {
                self.cache.insert(plate.clone(), record.clone());
                Ok(VehicleLookup::new(plate, record, VehicleSource::Registry))
            }
            Ok(None) => Err(ServiceError::NotFound(format!(
                "Vehicle {} not found in registry",
                plate
            ))),
            Err(e @ ServiceError::UpstreamFailure(_)) => match stale {
                Some(record) => {
                    warn!(plate = %plate, error = %e, "Registry unavailable, serving cached record");
                    Ok(VehicleLookup::new(plate, record, VehicleSource::Cache))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}
