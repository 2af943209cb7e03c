//! Clients for the third-party services the booking flow talks to.
//!
//! Every client has a bounded timeout and no automatic retries: a call either
//! succeeds or surfaces `ServiceError::UpstreamFailure` immediately.

pub mod email;
pub mod flight_data;
pub mod payment_gateway;
pub mod vehicle_registry;

use crate::{config::AppConfig, errors::ServiceError};
use email::{EmailSender, LogEmailSender, SmtpEmailSender};
use flight_data::{FlightDataProvider, HttpFlightDataProvider, MockFlightDataProvider};
use metrics::counter;
use payment_gateway::{HttpPaymentGateway, MockPaymentGateway, PaymentGateway};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vehicle_registry::{HttpVehicleRegistry, MockVehicleRegistry, VehicleRegistry};

/// The concrete provider behind each integration
#[derive(Clone)]
pub struct Integrations {
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub flight_data: Arc<dyn FlightDataProvider>,
    pub vehicle_registry: Arc<dyn VehicleRegistry>,
    pub email: Arc<dyn EmailSender>,
}

impl Integrations {
    /// HTTP/SMTP clients for every configured provider, offline stand-ins otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let timeout = config.http_client_timeout();

        let payment_gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
            Some(url) => Arc::new(HttpPaymentGateway::new(
                url.clone(),
                config.payment_api_key.clone(),
                timeout,
            )?),
            None => {
                info!("No payment gateway configured, using the offline gateway");
                Arc::new(MockPaymentGateway)
            }
        };

        let flight_data: Arc<dyn FlightDataProvider> = match &config.flight_data_url {
            Some(url) => Arc::new(HttpFlightDataProvider::new(
                url.clone(),
                config.flight_data_api_key.clone(),
                timeout,
            )?),
            None => {
                info!("No flight data provider configured, using the fixed schedule");
                Arc::new(MockFlightDataProvider)
            }
        };

        let vehicle_registry: Arc<dyn VehicleRegistry> = match &config.vehicle_registry_url {
            Some(url) => Arc::new(HttpVehicleRegistry::new(
                url.clone(),
                config.vehicle_registry_api_key.clone(),
                timeout,
            )?),
            None => {
                info!("No vehicle registry configured, using the deterministic registry");
                Arc::new(MockVehicleRegistry)
            }
        };

        let email: Arc<dyn EmailSender> = match &config.smtp_host {
            Some(host) => Arc::new(SmtpEmailSender::new(
                host,
                config.smtp_port,
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                config.email_from.clone(),
                timeout,
            )?),
            None => Arc::new(LogEmailSender::new()),
        };

        Ok(Self {
            payment_gateway,
            flight_data,
            vehicle_registry,
            email,
        })
    }

    /// Offline providers throughout
    pub fn offline() -> Self {
        Self {
            payment_gateway: Arc::new(MockPaymentGateway),
            flight_data: Arc::new(MockFlightDataProvider),
            vehicle_registry: Arc::new(MockVehicleRegistry),
            email: Arc::new(LogEmailSender::new()),
        }
    }
}

/// Builds a `reqwest` client with the given overall request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("airpark-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {}", e)))
}

/// Maps a transport or status failure to `UpstreamFailure`, counting it per provider.
pub(crate) fn upstream_error(provider: &'static str, err: impl std::fmt::Display) -> ServiceError {
    counter!("airpark.upstream.failures", 1, "provider" => provider);
    tracing::warn!(provider, error = %err, "Upstream call failed");
    ServiceError::upstream(provider, err)
}

/// Returns the response when its status is 2xx, otherwise an upstream failure.
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(upstream_error(
        provider,
        format!("unexpected status {}: {}", status, snippet),
    ))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls_without_double_slashes() {
        assert_eq!(
            join_url("https://pay.example/api/", "/checkouts"),
            "https://pay.example/api/checkouts"
        );
        assert_eq!(join_url("http://x", "a/b"), "http://x/a/b");
    }
}
