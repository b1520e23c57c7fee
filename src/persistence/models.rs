//! Database row models and their conversion into domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::{Order, PriceSnapshot, Provider, Service, Slot, User};
use crate::error::MarketError;

/// Column list selected/returned for slots.
pub const SLOT_COLUMNS: &str = "id, provider_id, start_at, end_at, status, customer_id, \
     service_id, price_snapshot, created_at, updated_at";

/// Column list selected/returned for orders.
pub const ORDER_COLUMNS: &str = "id, customer_id, provider_id, slot_ids, amount, currency, \
     platform_fee, destination_account, checkout_session_id, payment_intent_id, receipt_url, \
     status, hold_expires_at, created_at, updated_at";

/// Column list selected/returned for providers.
pub const PROVIDER_COLUMNS: &str = "id, owner_id, name, slug, hourly_rate, payment_account_id, \
     charges_enabled, payouts_enabled, details_submitted";

/// A row from the `slots` table.
#[derive(Debug, Clone, FromRow)]
pub struct SlotRow {
    /// Slot id.
    pub id: Uuid,
    /// Owning provider.
    pub provider_id: Uuid,
    /// Start instant.
    pub start_at: DateTime<Utc>,
    /// End instant.
    pub end_at: DateTime<Utc>,
    /// Status text.
    pub status: String,
    /// Reserving customer.
    pub customer_id: Option<Uuid>,
    /// Assigned service.
    pub service_id: Option<Uuid>,
    /// JSONB price snapshot.
    pub price_snapshot: Option<Json<PriceSnapshot>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = MarketError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            provider_id: row.provider_id.into(),
            start: row.start_at,
            end: row.end_at,
            status: row.status.parse().map_err(MarketError::PersistenceError)?,
            customer_id: row.customer_id.map(Into::into),
            service_id: row.service_id.map(Into::into),
            price_snapshot: row.price_snapshot.map(|Json(s)| s),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `orders` table.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    /// Order id.
    pub id: Uuid,
    /// Paying customer.
    pub customer_id: Uuid,
    /// Payee.
    pub provider_id: Uuid,
    /// Covered slots, in cart order.
    pub slot_ids: Vec<Uuid>,
    /// Amount in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Platform fee in minor units.
    pub platform_fee: i64,
    /// Gateway destination account.
    pub destination_account: String,
    /// Gateway checkout session id.
    pub checkout_session_id: Option<String>,
    /// Gateway payment intent id.
    pub payment_intent_id: Option<String>,
    /// Receipt URL.
    pub receipt_url: Option<String>,
    /// Status text.
    pub status: String,
    /// Hold expiry.
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = MarketError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            customer_id: row.customer_id.into(),
            provider_id: row.provider_id.into(),
            slot_ids: row.slot_ids.into_iter().map(Into::into).collect(),
            amount: row.amount,
            currency: row.currency,
            platform_fee: row.platform_fee,
            destination_account: row.destination_account,
            checkout_session_id: row.checkout_session_id,
            payment_intent_id: row.payment_intent_id,
            receipt_url: row.receipt_url,
            status: row.status.parse().map_err(MarketError::PersistenceError)?,
            hold_expires_at: row.hold_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `providers` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderRow {
    /// Provider id.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Slug.
    pub slug: String,
    /// Live hourly rate.
    pub hourly_rate: i64,
    /// Gateway account.
    pub payment_account_id: Option<String>,
    /// Charges enabled.
    pub charges_enabled: bool,
    /// Payouts enabled.
    pub payouts_enabled: bool,
    /// Details submitted.
    pub details_submitted: bool,
}

impl From<ProviderRow> for Provider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id.into(),
            owner_id: row.owner_id.into(),
            name: row.name,
            slug: row.slug,
            hourly_rate: row.hourly_rate,
            payment_account_id: row.payment_account_id,
            charges_enabled: row.charges_enabled,
            payouts_enabled: row.payouts_enabled,
            details_submitted: row.details_submitted,
        }
    }
}

/// A row from the `services` table.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRow {
    /// Service id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Slug.
    pub slug: String,
}

impl From<ServiceRow> for Service {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            slug: row.slug,
        }
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    /// Internal id.
    pub id: Uuid,
    /// External identity subject.
    pub external_id: String,
    /// Accepted terms version.
    pub accepted_terms_version: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            external_id: row.external_id,
            accepted_terms_version: row.accepted_terms_version,
        }
    }
}
