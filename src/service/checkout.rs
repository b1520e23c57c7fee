//! Checkout service: turns reserved slots into a pending order and a hosted
//! payment session.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use crate::domain::{
    CheckoutMetadata, EventBus, MarketEvent, NewOrder, Order, OrderId, Provider, Slot, SlotId,
    SlotStatus, UserId,
};
use crate::error::MarketError;
use crate::gateway::{CheckoutSessionRequest, PaymentGateway};
use crate::ledger::{BookingLedger, OrderLedger};
use crate::persistence::Store;

/// Money and redirect settings for checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPolicy {
    /// Lower-case ISO currency code.
    pub currency: String,
    /// Platform fee in basis points.
    pub platform_fee_bps: u32,
    /// Reservation hold attached to new orders, in minutes.
    pub hold_minutes: i64,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect after abandonment.
    pub cancel_url: String,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            platform_fee_bps: 1_000,
            hold_minutes: 30,
            success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
        }
    }
}

impl CheckoutPolicy {
    /// `round(amount × bps / 10 000)`, half away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::BadRequest`] if the fee does not fit.
    pub fn fee_for(&self, amount: i64) -> Result<i64, MarketError> {
        let scaled = i128::from(amount) * i128::from(self.platform_fee_bps);
        let fee = (scaled + 5_000) / 10_000;
        i64::try_from(fee).map_err(|_| MarketError::BadRequest("fee out of range".to_string()))
    }
}

/// Where to send the customer, and what was opened for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    /// The new pending order.
    pub order_id: OrderId,
    /// Gateway session id.
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

/// Validates a cart of reserved slots, prices it, opens a `pending` order
/// and a gateway checkout session.
///
/// Unlike bulk reservation this path is all-or-nothing: any invalid slot
/// fails the whole request before an order exists.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    slots: BookingLedger,
    orders: OrderLedger,
    gateway: Arc<dyn PaymentGateway>,
    event_bus: EventBus,
    policy: CheckoutPolicy,
}

impl CheckoutService {
    /// Creates a new `CheckoutService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        event_bus: EventBus,
        policy: CheckoutPolicy,
    ) -> Self {
        Self {
            slots: BookingLedger::new(Arc::clone(&store)),
            orders: OrderLedger::new(Arc::clone(&store)),
            store,
            gateway,
            event_bus,
            policy,
        }
    }

    /// Opens a checkout for slots the customer already holds.
    ///
    /// # Errors
    ///
    /// - [`MarketError::BadRequest`] for an empty cart, a past slot, slots of
    ///   more than one provider, a provider that cannot take payments, or a
    ///   non-positive amount.
    /// - [`MarketError::NotFound`] if a slot or the provider is missing.
    /// - [`MarketError::Conflict`] if a slot is not in `booked`.
    /// - [`MarketError::Forbidden`] if a slot is held by someone else.
    /// - [`MarketError::GatewayError`] if the gateway call fails; the order
    ///   stays `pending`.
    pub async fn create_session(
        &self,
        customer: UserId,
        slot_ids: &[SlotId],
    ) -> Result<CheckoutRedirect, MarketError> {
        let mut seen = HashSet::new();
        let ids: Vec<SlotId> = slot_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Err(MarketError::BadRequest("cart is empty".to_string()));
        }

        let mut loaded: HashMap<SlotId, Slot> = self
            .slots
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|slot| (slot.id, slot))
            .collect();
        let mut cart = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = loaded
                .remove(id)
                .ok_or_else(|| MarketError::NotFound(format!("slot {id} not found")))?;
            cart.push(slot);
        }

        let now = Utc::now();
        for slot in &cart {
            if slot.status != SlotStatus::Booked {
                return Err(MarketError::Conflict(format!(
                    "slot {} is not reserved",
                    slot.id
                )));
            }
            if slot.customer_id != Some(customer) {
                return Err(MarketError::Forbidden(format!(
                    "slot {} is reserved by another customer",
                    slot.id
                )));
            }
            if slot.start <= now {
                return Err(MarketError::BadRequest(format!(
                    "slot {} has already started",
                    slot.id
                )));
            }
        }

        let providers: BTreeSet<_> = cart.iter().map(|slot| slot.provider_id).collect();
        let provider_id = match (providers.len(), providers.first()) {
            (1, Some(id)) => *id,
            _ => {
                return Err(MarketError::BadRequest(
                    "all slots in one checkout must belong to the same provider".to_string(),
                ));
            }
        };
        let provider = self
            .store
            .provider_by_id(provider_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("provider {provider_id} not found")))?;
        let destination = provider
            .payable_account()
            .ok_or_else(|| {
                MarketError::BadRequest("provider not ready to take payments".to_string())
            })?
            .to_string();

        let amount = cart_amount(&cart, &provider)?;
        let platform_fee = self.policy.fee_for(amount)?;
        let hold_expires_at = TimeDelta::try_minutes(self.policy.hold_minutes)
            .and_then(|hold| now.checked_add_signed(hold))
            .ok_or_else(|| MarketError::Internal("reservation hold out of range".to_string()))?;

        let order = self
            .orders
            .create_pending(NewOrder {
                customer_id: customer,
                provider_id,
                slot_ids: ids.clone(),
                amount,
                currency: self.policy.currency.clone(),
                platform_fee,
                destination_account: destination.clone(),
                hold_expires_at: Some(hold_expires_at),
            })
            .await?;

        let metadata = CheckoutMetadata {
            order_id: order.id,
            customer_id: customer,
            provider_id,
            slot_ids: ids,
        };
        let request = CheckoutSessionRequest {
            line_item_name: line_item_name(&cart, &provider),
            amount,
            currency: order.currency.clone(),
            application_fee: platform_fee,
            destination_account: destination,
            metadata: metadata
                .to_pairs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            success_url: self.policy.success_url.clone(),
            cancel_url: self.policy.cancel_url.clone(),
            expires_at: order.hold_expires_at,
            client_reference_id: customer.to_string(),
        };

        let session = match self.gateway.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "checkout session failed, order left pending");
                return Err(e);
            }
        };
        self.orders
            .attach_external_session(order.id, &session.id)
            .await?;

        let _ = self.event_bus.publish(MarketEvent::OrderCreated {
            provider_id,
            order_id: order.id,
            amount,
            timestamp: Utc::now(),
        });
        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            amount,
            platform_fee,
            "checkout session opened"
        );
        Ok(CheckoutRedirect {
            order_id: order.id,
            session_id: session.id,
            url: session.url,
        })
    }

    /// Looks up the order behind a checkout session for its customer.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if no order is bound to the session,
    /// or [`MarketError::Forbidden`] if it belongs to someone else.
    pub async fn get_order_by_session_id(
        &self,
        customer: UserId,
        session_id: &str,
    ) -> Result<Order, MarketError> {
        let order = self
            .orders
            .by_session(session_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("no order for session {session_id}")))?;
        if order.customer_id != customer {
            return Err(MarketError::Forbidden(
                "order belongs to another customer".to_string(),
            ));
        }
        Ok(order)
    }
}

/// `Σ minutes × rate / 60`, using the booking-time rate when present.
fn cart_amount(cart: &[Slot], provider: &Provider) -> Result<i64, MarketError> {
    let overflow = || MarketError::BadRequest("order amount out of range".to_string());
    let mut rate_minutes: i64 = 0;
    for slot in cart {
        let rate = slot
            .price_snapshot
            .as_ref()
            .map_or(provider.hourly_rate, |snap| snap.hourly_rate);
        let part = slot
            .duration_minutes()
            .checked_mul(rate)
            .ok_or_else(overflow)?;
        rate_minutes = rate_minutes.checked_add(part).ok_or_else(overflow)?;
    }
    let amount = rate_minutes / 60;
    if amount <= 0 {
        return Err(MarketError::BadRequest(
            "order amount must be positive".to_string(),
        ));
    }
    Ok(amount)
}

fn line_item_name(cart: &[Slot], provider: &Provider) -> String {
    let service = cart
        .iter()
        .find_map(|slot| slot.price_snapshot.as_ref())
        .map_or("Session", |snap| snap.service_name.as_str());
    let unit = if cart.len() == 1 { "slot" } else { "slots" };
    format!("{service} with {} ({} {unit})", provider.name, cart.len())
}
