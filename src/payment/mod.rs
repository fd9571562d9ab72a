use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const PROVIDER_NAME: &str = "mercadopago";
const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";

/// Hosted checkout preference sent to the provider. The external reference is
/// the order id; it comes back on webhook reconciliation as the join key.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub back_urls: BackUrls,
    pub auto_return: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    pub external_reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub currency_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
    pub id: String,
    /// Hosted checkout URL the client is redirected to
    pub init_point: String,
}

/// Payment details fetched back from the provider during reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPayment {
    pub id: serde_json::Value,
    pub status: String,
    pub external_reference: Option<String>,
}

impl PreferenceRequest {
    /// Builds the single-line-item preference for an order: one unit priced
    /// at the order total, referenced by the order id.
    pub fn for_order(
        order_id: Uuid,
        total: Decimal,
        currency: &str,
        back_urls: BackUrls,
        notification_url: Option<String>,
    ) -> Self {
        Self {
            items: vec![PreferenceItem {
                id: order_id.to_string(),
                title: format!("Order #{}", order_id),
                quantity: 1,
                unit_price: total.to_f64().unwrap_or(0.0),
                currency_id: currency.to_string(),
            }],
            back_urls,
            auto_return: "approved".to_string(),
            notification_url,
            external_reference: order_id.to_string(),
        }
    }
}

/// Seam to the external payment provider. Production uses the HTTP client;
/// tests substitute an in-memory implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<PreferenceResponse, ServiceError>;

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ServiceError>;

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// MercadoPago REST client.
pub struct MercadoPagoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<PreferenceResponse, ServiceError> {
        let url = format!("{}/checkout/preferences", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "preference creation failed with {}: {}",
                status, body
            )));
        }

        response
            .json::<PreferenceResponse>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ServiceError> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "payment lookup failed with {}",
                response.status()
            )));
        }

        response
            .json::<ProviderPayment>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))
    }
}
