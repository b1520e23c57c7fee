//! Providers, users and catalog services referenced by the booking core.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ProviderId, ServiceId, UserId};

/// A payee that owns a calendar of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Provider {
    /// Provider identifier.
    pub id: ProviderId,
    /// User that owns this provider and may edit its slots.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Live hourly rate in minor currency units.
    pub hourly_rate: i64,
    /// Connected gateway account receiving transfers.
    pub payment_account_id: Option<String>,
    /// Gateway reports the account may accept charges.
    pub charges_enabled: bool,
    /// Gateway reports the account may receive payouts.
    pub payouts_enabled: bool,
    /// Gateway reports onboarding details were submitted.
    pub details_submitted: bool,
}

impl Provider {
    /// Returns the destination account if the provider can take payments.
    #[must_use]
    pub fn payable_account(&self) -> Option<&str> {
        match &self.payment_account_id {
            Some(account) if self.details_submitted && self.charges_enabled => {
                Some(account.as_str())
            }
            _ => None,
        }
    }
}

/// Verification flags mirrored from the gateway onto a [`Provider`].
///
/// Absent flags in a gateway payload read as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AccountFlags {
    /// Charges enabled.
    #[serde(default)]
    pub charges_enabled: bool,
    /// Payouts enabled.
    #[serde(default)]
    pub payouts_enabled: bool,
    /// Onboarding details submitted.
    #[serde(default)]
    pub details_submitted: bool,
}

/// A platform user, resolved from an external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal identifier.
    pub id: UserId,
    /// External identity subject this user is bound to.
    pub external_id: String,
    /// Terms-of-service version the user accepted, if any.
    pub accepted_terms_version: Option<String>,
}

/// A catalog service a customer assigns to a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Service {
    /// Service identifier.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}
