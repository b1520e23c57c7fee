//! Checkout metadata: the only channel from a gateway notification back to
//! its order.
//!
//! The gateway echoes back a flat string map. Wire format (stable):
//!
//! | Key          | Value                                             |
//! |--------------|---------------------------------------------------|
//! | `orderId`    | opaque order id                                   |
//! | `customerId` | opaque user id                                    |
//! | `providerId` | opaque provider id                                |
//! | `slotIdsCsv` | comma-joined slot ids; trimmed, empty segments dropped |

use std::collections::HashMap;

use super::{OrderId, ProviderId, SlotId, UserId};

/// Metadata key for the order id.
pub const ORDER_ID_KEY: &str = "orderId";
/// Metadata key for the customer id.
pub const CUSTOMER_ID_KEY: &str = "customerId";
/// Metadata key for the provider id.
pub const PROVIDER_ID_KEY: &str = "providerId";
/// Metadata key for the slot id list.
pub const SLOT_IDS_KEY: &str = "slotIdsCsv";

/// Reasons a metadata map cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// A required key is absent.
    #[error("missing metadata key {0}")]
    Missing(&'static str),
    /// A value could not be parsed as an id.
    #[error("malformed metadata value for {key}: {value}")]
    Malformed {
        /// Offending key.
        key: &'static str,
        /// Offending raw value.
        value: String,
    },
    /// The slot list decoded to nothing.
    #[error("metadata carries no slot ids")]
    NoSlots,
}

/// Correlation data attached to a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    /// Order the session pays for.
    pub order_id: OrderId,
    /// Paying customer.
    pub customer_id: UserId,
    /// Payee.
    pub provider_id: ProviderId,
    /// Slots covered by the order.
    pub slot_ids: Vec<SlotId>,
}

impl CheckoutMetadata {
    /// Encodes into the flat key/value pairs sent to the gateway.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let csv = self
            .slot_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        vec![
            (ORDER_ID_KEY, self.order_id.to_string()),
            (CUSTOMER_ID_KEY, self.customer_id.to_string()),
            (PROVIDER_ID_KEY, self.provider_id.to_string()),
            (SLOT_IDS_KEY, csv),
        ]
    }

    /// Decodes the map echoed back by the gateway.
    ///
    /// # Errors
    ///
    /// Returns a [`MetadataError`] when a key is missing, an id is
    /// malformed, or the slot list is empty.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, MetadataError> {
        let order_id = parse_key(map, ORDER_ID_KEY)?;
        let customer_id = parse_key(map, CUSTOMER_ID_KEY)?;
        let provider_id = parse_key(map, PROVIDER_ID_KEY)?;
        let csv = map
            .get(SLOT_IDS_KEY)
            .ok_or(MetadataError::Missing(SLOT_IDS_KEY))?;
        let slot_ids = parse_slot_csv(csv)?;
        if slot_ids.is_empty() {
            return Err(MetadataError::NoSlots);
        }
        Ok(Self {
            order_id,
            customer_id,
            provider_id,
            slot_ids,
        })
    }
}

/// Parses a comma-joined slot id list, trimming whitespace and dropping
/// empty segments.
///
/// # Errors
///
/// Returns [`MetadataError::Malformed`] if a non-empty segment is not an id.
pub fn parse_slot_csv(csv: &str) -> Result<Vec<SlotId>, MetadataError> {
    csv.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.parse().map_err(|_| MetadataError::Malformed {
                key: SLOT_IDS_KEY,
                value: segment.to_string(),
            })
        })
        .collect()
}

fn parse_key<T: std::str::FromStr>(
    map: &HashMap<String, String>,
    key: &'static str,
) -> Result<T, MetadataError> {
    let raw = map.get(key).ok_or(MetadataError::Missing(key))?;
    raw.trim().parse().map_err(|_| MetadataError::Malformed {
        key,
        value: raw.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn sample() -> CheckoutMetadata {
        CheckoutMetadata {
            order_id: OrderId::new(),
            customer_id: UserId::new(),
            provider_id: ProviderId::new(),
            slot_ids: vec![SlotId::new(), SlotId::new()],
        }
    }

    fn as_map(pairs: Vec<(&'static str, String)>) -> HashMap<String, String> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn decodes_what_it_encodes() {
        let meta = sample();
        let Ok(decoded) = CheckoutMetadata::from_map(&as_map(meta.to_pairs())) else {
            panic!("expected metadata to decode");
        };
        assert_eq!(decoded, meta);
    }

    #[test]
    fn csv_is_trimmed_and_empty_filtered() {
        let (a, b) = (SlotId::new(), SlotId::new());
        let csv = format!(" {a} ,, {b},");
        assert_eq!(parse_slot_csv(&csv), Ok(vec![a, b]));
    }

    #[test]
    fn missing_key_is_reported() {
        let mut map = as_map(sample().to_pairs());
        map.remove(ORDER_ID_KEY);
        assert_eq!(
            CheckoutMetadata::from_map(&map),
            Err(MetadataError::Missing(ORDER_ID_KEY))
        );
    }

    #[test]
    fn blank_slot_list_is_rejected() {
        let mut map = as_map(sample().to_pairs());
        map.insert(SLOT_IDS_KEY.to_string(), " , ".to_string());
        assert_eq!(CheckoutMetadata::from_map(&map), Err(MetadataError::NoSlots));
    }

    #[test]
    fn garbage_segment_is_malformed() {
        assert!(matches!(
            parse_slot_csv("abc"),
            Err(MetadataError::Malformed { .. })
        ));
    }
}
