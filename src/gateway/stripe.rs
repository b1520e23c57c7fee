//! Stripe-compatible checkout client over `reqwest`.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use crate::error::MarketError;

/// Stripe refuses session expiries closer than 30 minutes.
const MIN_SESSION_MINUTES: i64 = 31;

/// Live gateway client.
#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeGateway {
    /// Creates a client for `api_base` authenticated with `secret_key`.
    #[must_use]
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    fn form_fields(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.line_item_name.clone(),
            ),
            (
                "payment_intent_data[application_fee_amount]".to_string(),
                request.application_fee.to_string(),
            ),
            (
                "payment_intent_data[transfer_data][destination]".to_string(),
                request.destination_account.clone(),
            ),
        ];
        if let Some(expires_at) = request.expires_at {
            let floor = Utc::now() + TimeDelta::minutes(MIN_SESSION_MINUTES);
            fields.push((
                "expires_at".to_string(),
                expires_at.max(floor).timestamp().to_string(),
            ));
        }
        for (key, value) in &request.metadata {
            fields.push((format!("metadata[{key}]"), value.clone()));
            fields.push((
                format!("payment_intent_data[metadata][{key}]"),
                value.clone(),
            ));
        }
        fields
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, MarketError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::form_fields(request))
            .send()
            .await
            .map_err(|e| MarketError::GatewayError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "checkout session request rejected");
            return Err(MarketError::GatewayError(format!(
                "gateway returned {status}"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| MarketError::GatewayError(e.to_string()))?;
        let url = session.url.ok_or_else(|| {
            MarketError::GatewayError("checkout session has no url".to_string())
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
