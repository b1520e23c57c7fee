//! Offline gateway for development and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use crate::error::MarketError;

/// Gateway that mints fake sessions and records every request.
#[derive(Debug, Default)]
pub struct MockGateway {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    failing: AtomicBool,
}

impl MockGateway {
    /// Creates a mock that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, MarketError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::GatewayError(
                "mock gateway unavailable".to_string(),
            ));
        }
        self.requests.lock().await.push(request.clone());

        let id = format!("cs_mock_{}", Uuid::new_v4().simple());
        tracing::info!(
            session_id = %id,
            amount = request.amount,
            fee = request.application_fee,
            destination = %request.destination_account,
            "mock checkout session created"
        );
        Ok(CheckoutSession {
            url: format!("https://checkout.mock.local/pay/{id}"),
            id,
        })
    }
}
