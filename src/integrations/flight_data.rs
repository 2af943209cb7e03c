use super::{build_http_client, ensure_success, join_url, upstream_error};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::instrument;
use utoipa::ToSchema;

const PROVIDER: &str = "flight_data";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlightDirection {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Flight {
    pub flight_number: String,
    pub airline: Option<String>,
    /// Origin for arrivals, destination for departures
    pub airport: Option<String>,
    pub direction: FlightDirection,
    pub scheduled_time: DateTime<Utc>,
    pub estimated_time: Option<DateTime<Utc>>,
    pub status: String,
}

/// Read-only flight schedule source
#[async_trait]
pub trait FlightDataProvider: Send + Sync {
    async fn arrivals(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError>;

    async fn departures(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError>;

    async fn status(
        &self,
        flight_numbers: &[String],
        date: NaiveDate,
        direction: FlightDirection,
    ) -> Result<Vec<Flight>, ServiceError>;
}

#[derive(Clone)]
pub struct HttpFlightDataProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFlightDataProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: StdDuration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
        })
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Flight>, ServiceError> {
        let mut request = self
            .client
            .get(join_url(&self.base_url, path))
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))?;

        ensure_success(PROVIDER, response)
            .await?
            .json::<Vec<Flight>>()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))
    }
}

#[async_trait]
impl FlightDataProvider for HttpFlightDataProvider {
    #[instrument(skip(self))]
    async fn arrivals(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError> {
        self.fetch("/arrivals", &[("date", date.to_string())]).await
    }

    #[instrument(skip(self))]
    async fn departures(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError> {
        self.fetch("/departures", &[("date", date.to_string())])
            .await
    }

    #[instrument(skip(self))]
    async fn status(
        &self,
        flight_numbers: &[String],
        date: NaiveDate,
        direction: FlightDirection,
    ) -> Result<Vec<Flight>, ServiceError> {
        self.fetch(
            "/flights/status",
            &[
                ("flights", flight_numbers.join(",")),
                ("date", date.to_string()),
                ("type", direction.to_string()),
            ],
        )
        .await
    }
}

/// Fixed schedule used when no provider is configured
#[derive(Clone, Default)]
pub struct MockFlightDataProvider;

const MOCK_SCHEDULE: &[(&str, &str, &str, u32)] = &[
    ("FI204", "Icelandair", "CPH", 7),
    ("FI450", "Icelandair", "LHR", 10),
    ("W6179", "Wizz Air", "BUD", 13),
    ("BA800", "British Airways", "LHR", 16),
    ("FI615", "Icelandair", "JFK", 22),
];

impl MockFlightDataProvider {
    fn schedule(date: NaiveDate, direction: FlightDirection) -> Vec<Flight> {
        let offset = match direction {
            FlightDirection::Arrival => 0,
            FlightDirection::Departure => 1,
        };
        MOCK_SCHEDULE
            .iter()
            .filter_map(|(number, airline, airport, hour)| {
                let scheduled = date.and_hms_opt((hour + offset) % 24, 30, 0)?.and_utc();
                Some(Flight {
                    flight_number: (*number).to_string(),
                    airline: Some((*airline).to_string()),
                    airport: Some((*airport).to_string()),
                    direction,
                    scheduled_time: scheduled,
                    estimated_time: Some(scheduled + Duration::minutes(5)),
                    status: "scheduled".to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl FlightDataProvider for MockFlightDataProvider {
    async fn arrivals(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError> {
        Ok(Self::schedule(date, FlightDirection::Arrival))
    }

    async fn departures(&self, date: NaiveDate) -> Result<Vec<Flight>, ServiceError> {
        Ok(Self::schedule(date, FlightDirection::Departure))
    }

    async fn status(
        &self,
        flight_numbers: &[String],
        date: NaiveDate,
        direction: FlightDirection,
    ) -> Result<Vec<Flight>, ServiceError> {
        Ok(Self::schedule(date, direction)
            .into_iter()
            .filter(|f| flight_numbers.contains(&f.flight_number))
            .collect())
    }
}
