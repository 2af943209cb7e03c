use crate::{
    cache::TtlCache,
    common::parse_date,
    errors::ServiceError,
    integrations::flight_data::{Flight, FlightDataProvider, FlightDirection},
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub const MAX_FLIGHTS_PER_QUERY: usize = 10;
const MAX_CACHED_QUERIES: usize = 1_000;

static FLIGHT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{2}\d{1,4}[A-Z]?$").expect("flight number pattern is valid")
});

/// Upper-cases and strips spaces, then checks the IATA flight number shape.
pub fn normalize_flight_number(value: &str) -> Result<String, ServiceError> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    if FLIGHT_NUMBER.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ServiceError::ValidationError(format!(
            "Invalid flight number: {}",
            value
        )))
    }
}

/// Parses a comma-separated list of flight numbers.
pub fn parse_flight_list(value: &str) -> Result<Vec<String>, ServiceError> {
    let flights = value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(normalize_flight_number)
        .collect::<Result<Vec<_>, _>>()?;

    if flights.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one flight number is required".to_string(),
        ));
    }
    if flights.len() > MAX_FLIGHTS_PER_QUERY {
        return Err(ServiceError::ValidationError(format!(
            "At most {} flight numbers per request",
            MAX_FLIGHTS_PER_QUERY
        )));
    }
    Ok(flights)
}

fn parse_direction(value: &str) -> Result<FlightDirection, ServiceError> {
    FlightDirection::from_str(value.trim()).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Invalid type '{}' (expected arrival or departure)",
            value
        ))
    })
}

/// Cached, read-only access to the flight data provider. Provider errors are
/// returned as they are; nothing is served from a stale entry.
#[derive(Clone)]
pub struct FlightService {
    provider: Arc<dyn FlightDataProvider>,
    cache: Arc<TtlCache<String, Vec<Flight>>>,
}

impl FlightService {
    pub fn new(provider: Arc<dyn FlightDataProvider>, cache_ttl: Duration) -> Self {
        Self {
            provider,
            cache: Arc::new(TtlCache::new(cache_ttl, MAX_CACHED_QUERIES)),
        }
    }

    #[instrument(skip(self))]
    pub async fn arrivals(&self, date: &str) -> Result<Vec<Flight>, ServiceError> {
        let date = parse_date(date, "date")?;
        let key = format!("arrivals:{}", date);
        self.cached(key, || self.provider.arrivals(date)).await
    }

    #[instrument(skip(self))]
    pub async fn departures(&self, date: &str) -> Result<Vec<Flight>, ServiceError> {
        let date = parse_date(date, "date")?;
        let key = format!("departures:{}", date);
        self.cached(key, || self.provider.departures(date)).await
    }

    #[instrument(skip(self))]
    pub async fn status(
        &self,
        flights: &str,
        date: &str,
        direction: &str,
    ) -> Result<Vec<Flight>, ServiceError> {
        let flights = parse_flight_list(flights)?;
        let date: NaiveDate = parse_date(date, "date")?;
        let direction = parse_direction(direction)?;

        let mut sorted = flights.clone();
        sorted.sort();
        let key = format!("status:{}:{}:{}", direction, date, sorted.join(","));
        self.cached(key, || self.provider.status(&flights, date, direction))
            .await
    }

    async fn cached<F, Fut>(&self, key: String, fetch: F) -> Result<Vec<Flight>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Flight>, ServiceError>>,
    {
        if let Some(hit) = self.cache.get(&key).fresh() {
            debug!(key = %key, "Flight cache hit");
            return Ok(hit);
        }
        let flights = fetch().await?;
        self.cache.insert(key, flights.clone());
        Ok(flights)
    }
}
