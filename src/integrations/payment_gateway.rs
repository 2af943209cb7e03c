use super::{build_http_client, ensure_success, join_url, upstream_error};
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const PROVIDER: &str = "payment_gateway";

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub amount: i64,
    pub currency: String,
    pub booking_reference: String,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutSession {
    /// Gateway-side identifier, echoed back in webhooks
    pub checkout_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: RefundStatus,
}

/// The payment provider. It owns payment state; local rows mirror it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest)
        -> Result<CheckoutSession, ServiceError>;

    async fn refund(
        &self,
        provider_reference: &str,
        amount: i64,
        reason: &str,
    ) -> Result<RefundResult, ServiceError>;
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    amount: i64,
    reason: &'a str,
}

/// REST client for the hosted checkout gateway
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
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

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(join_url(&self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(reference = %request.booking_reference))]
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let response = self
            .post("/checkouts")
            .json(&request)
            .send()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))?;

        ensure_success(PROVIDER, response)
            .await?
            .json::<CheckoutSession>()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        provider_reference: &str,
        amount: i64,
        reason: &str,
    ) -> Result<RefundResult, ServiceError> {
        let response = self
            .post(&format!("/payments/{}/refunds", provider_reference))
            .json(&RefundBody { amount, reason })
            .send()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))?;

        ensure_success(PROVIDER, response)
            .await?
            .json::<RefundResult>()
            .await
            .map_err(|e| upstream_error(PROVIDER, e))
    }
}

/// Offline gateway used when none is configured. Every checkout redirects
/// straight back to the return URL and every refund succeeds.
#[derive(Clone, Default)]
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let checkout_id = format!("mock_chk_{}", Uuid::new_v4().simple());
        info!(checkout_id = %checkout_id, amount = request.amount, "Mock checkout created");
        let separator = if request.return_url.contains('?') { '&' } else { '?' };
        Ok(CheckoutSession {
            redirect_url: format!(
                "{}{}reference={}&checkout_id={}",
                request.return_url, separator, request.booking_reference, checkout_id
            ),
            checkout_id,
        })
    }

    async fn refund(
        &self,
        provider_reference: &str,
        amount: i64,
        _reason: &str,
    ) -> Result<RefundResult, ServiceError> {
        info!(provider_reference, amount, "Mock refund issued");
        Ok(RefundResult {
            refund_id: format!("mock_ref_{}", Uuid::new_v4().simple()),
            status: RefundStatus::Succeeded,
        })
    }
}
