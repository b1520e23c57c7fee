//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Secrets have no defaults; everything
//! else falls back to the reference policy.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::SlotPolicy;
use crate::service::checkout::CheckoutPolicy;

/// Longest accepted slot length: one day.
const MAX_SLOT_DURATION_MINUTES: i64 = 24 * 60;

/// Longest accepted checkout hold: one week.
const MAX_RESERVATION_HOLD_MINUTES: i64 = 7 * 24 * 60;

/// Top-level service configuration.
///
/// Loaded once at startup via [`MarketConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Apply SQL migrations at startup.
    pub run_migrations: bool,

    /// Directory holding the SQL migrations.
    pub migrations_dir: PathBuf,

    /// Gateway API secret key. `None` selects the offline mock gateway.
    pub stripe_secret_key: Option<String>,

    /// Gateway API base URL.
    pub stripe_api_base: String,

    /// Shared secret used to verify webhook signatures.
    pub webhook_secret: String,

    /// Maximum age in seconds of a signed webhook timestamp.
    pub webhook_tolerance_secs: i64,

    /// Redirect after a successful checkout. `{CHECKOUT_SESSION_ID}` is
    /// substituted by the gateway.
    pub checkout_success_url: String,

    /// Redirect after an abandoned checkout.
    pub checkout_cancel_url: String,

    /// Lower-case ISO currency code for all orders.
    pub currency: String,

    /// Platform fee in basis points of the order amount.
    pub platform_fee_bps: u32,

    /// Required slot length in minutes.
    pub slot_duration_minutes: i64,

    /// UTC hour on which slots may not start.
    pub slot_blackout_hour: Option<u32>,

    /// Length of the reservation hold attached to new orders.
    pub reservation_hold_minutes: i64,

    /// Current terms-of-service version customers must have accepted.
    pub terms_version: String,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl MarketConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if a set value cannot be parsed or violates a
    /// policy bound (see [`MarketConfig::from_source`]).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is not a socket address,
    /// `PLATFORM_FEE_BPS` exceeds 10 000, `SLOT_BLACKOUT_HOUR` is not an
    /// hour of day, or the slot duration or hold length is outside its
    /// allowed range.
    pub fn from_source<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let platform_fee_bps = parse_env(&lookup, "PLATFORM_FEE_BPS", 1_000);
        if platform_fee_bps > 10_000 {
            return Err(format!("PLATFORM_FEE_BPS must be <= 10000, got {platform_fee_bps}").into());
        }

        let slot_blackout_hour = match lookup("SLOT_BLACKOUT_HOUR").as_deref() {
            None => Some(23),
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => {
                let hour: u32 = v.parse()?;
                if hour > 23 {
                    return Err(format!("SLOT_BLACKOUT_HOUR must be 0-23, got {hour}").into());
                }
                Some(hour)
            }
        };

        let slot_duration_minutes = parse_env(&lookup, "SLOT_DURATION_MINUTES", 60);
        let reservation_hold_minutes = parse_env(&lookup, "RESERVATION_HOLD_MINUTES", 30);
        if !(1..=MAX_SLOT_DURATION_MINUTES).contains(&slot_duration_minutes) {
            return Err(format!(
                "SLOT_DURATION_MINUTES must be 1-{MAX_SLOT_DURATION_MINUTES}, got {slot_duration_minutes}"
            )
            .into());
        }
        if !(1..=MAX_RESERVATION_HOLD_MINUTES).contains(&reservation_hold_minutes) {
            return Err(format!(
                "RESERVATION_HOLD_MINUTES must be 1-{MAX_RESERVATION_HOLD_MINUTES}, got {reservation_hold_minutes}"
            )
            .into());
        }

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections: parse_env(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
            database_min_connections: parse_env(&lookup, "DATABASE_MIN_CONNECTIONS", 2),
            database_connect_timeout_secs: parse_env(&lookup, "DATABASE_CONNECT_TIMEOUT_SECS", 5),
            run_migrations: parse_env_bool(&lookup, "DATABASE_RUN_MIGRATIONS", true),
            migrations_dir: lookup("DATABASE_MIGRATIONS_DIR")
                .map_or_else(|| PathBuf::from("./migrations"), PathBuf::from),
            stripe_secret_key: lookup("STRIPE_SECRET_KEY").filter(|v| !v.trim().is_empty()),
            stripe_api_base: lookup("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            webhook_secret: lookup("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            webhook_tolerance_secs: parse_env(&lookup, "WEBHOOK_TOLERANCE_SECS", 300),
            checkout_success_url: lookup("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| {
                "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                    .to_string()
            }),
            checkout_cancel_url: lookup("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|| "http://localhost:3000/checkout/cancel".to_string()),
            currency: lookup("CURRENCY")
                .unwrap_or_else(|| "usd".to_string())
                .to_ascii_lowercase(),
            platform_fee_bps,
            slot_duration_minutes,
            slot_blackout_hour,
            reservation_hold_minutes,
            terms_version: lookup("TERMS_VERSION").unwrap_or_else(|| "2024-01".to_string()),
            event_bus_capacity: parse_env(&lookup, "EVENT_BUS_CAPACITY", 10_000),
            request_timeout_secs: parse_env(&lookup, "REQUEST_TIMEOUT_SECS", 30),
            log_json: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Slot-shape policy derived from this configuration.
    #[must_use]
    pub fn slot_policy(&self) -> SlotPolicy {
        SlotPolicy {
            duration_minutes: self.slot_duration_minutes,
            blackout_hour: self.slot_blackout_hour,
        }
    }

    /// Checkout money/hold policy derived from this configuration.
    #[must_use]
    pub fn checkout_policy(&self) -> CheckoutPolicy {
        CheckoutPolicy {
            currency: self.currency.clone(),
            platform_fee_bps: self.platform_fee_bps,
            hold_minutes: self.reservation_hold_minutes,
            success_url: self.checkout_success_url.clone(),
            cancel_url: self.checkout_cancel_url.clone(),
        }
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<MarketConfig, Box<dyn std::error::Error>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MarketConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_policy() {
        let Ok(cfg) = load(&[]) else {
            panic!("defaults should load");
        };
        assert!(cfg.database_url.is_none());
        assert!(cfg.stripe_secret_key.is_none());
        assert_eq!(cfg.platform_fee_bps, 1_000);
        assert_eq!(cfg.slot_policy(), SlotPolicy::default());
        assert_eq!(cfg.currency, "usd");
        assert_eq!(cfg.reservation_hold_minutes, 30);
    }

    #[test]
    fn blackout_hour_can_be_disabled() {
        let Ok(cfg) = load(&[("SLOT_BLACKOUT_HOUR", "none")]) else {
            panic!("config should load");
        };
        assert!(cfg.slot_blackout_hour.is_none());
    }

    #[test]
    fn rejects_out_of_range_knobs() {
        assert!(load(&[("PLATFORM_FEE_BPS", "20000")]).is_err());
        assert!(load(&[("SLOT_BLACKOUT_HOUR", "24")]).is_err());
        assert!(load(&[("SLOT_DURATION_MINUTES", "0")]).is_err());
        assert!(load(&[("SLOT_DURATION_MINUTES", "200000000000000")]).is_err());
        assert!(load(&[("RESERVATION_HOLD_MINUTES", "200000000000000")]).is_err());
        assert!(load(&[("RESERVATION_HOLD_MINUTES", "-5")]).is_err());
        tokio_test::assert_ok!(load(&[("SLOT_DURATION_MINUTES", "1440")]));
        assert!(load(&[("LISTEN_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn bools_and_formats_parse() {
        let Ok(cfg) = load(&[
            ("DATABASE_RUN_MIGRATIONS", "FALSE"),
            ("LOG_FORMAT", "json"),
            ("CURRENCY", "EUR"),
        ]) else {
            panic!("config should load");
        };
        assert!(!cfg.run_migrations);
        assert!(cfg.log_json);
        assert_eq!(cfg.currency, "eur");
    }
}
