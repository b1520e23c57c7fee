//! Slot-shape rules: hour alignment, fixed duration, blackout hour,
//! future-only.
//!
//! Pure and stateless. Used by provider-side creation and moves; the
//! reservation path enforces the future-only rule through its query filters.

use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};

use crate::error::MarketError;

/// Shape constraints every slot must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    /// Required slot length in minutes.
    pub duration_minutes: i64,
    /// Hour of day (UTC) on which no slot may start.
    pub blackout_hour: Option<u32>,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            blackout_hour: Some(23),
        }
    }
}

impl SlotPolicy {
    /// Normalizes and validates a requested interval.
    ///
    /// Both ends are truncated to the start of their hour before checking.
    /// Returns the normalized `(start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::BadRequest`] if the slot starts in the blackout
    /// hour, does not have the exact configured duration, or does not start
    /// strictly after `now`.
    pub fn validate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), MarketError> {
        let start = start_of_hour(start)?;
        let end = start_of_hour(end)?;

        if self.blackout_hour == Some(start.hour()) {
            return Err(MarketError::BadRequest(format!(
                "slots may not start at {:02}:00",
                start.hour()
            )));
        }

        if TimeDelta::try_minutes(self.duration_minutes) != Some(end - start) {
            return Err(MarketError::BadRequest(format!(
                "slot must last exactly {} minutes",
                self.duration_minutes
            )));
        }

        if start <= now {
            return Err(MarketError::BadRequest(
                "slot must start in the future".to_string(),
            ));
        }

        Ok((start, end))
    }
}

fn start_of_hour(t: DateTime<Utc>) -> Result<DateTime<Utc>, MarketError> {
    t.duration_trunc(TimeDelta::hours(1))
        .map_err(|e| MarketError::BadRequest(format!("invalid instant {t}: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        let Some(t) = Utc.with_ymd_and_hms(2031, 5, 10, h, m, 0).single() else {
            panic!("valid timestamp");
        };
        t
    }

    fn now() -> DateTime<Utc> {
        at(8, 0)
    }

    #[test]
    fn accepts_aligned_future_hour() {
        let policy = SlotPolicy::default();
        let Ok((s, e)) = policy.validate(at(10, 0), at(11, 0), now()) else {
            panic!("expected valid slot");
        };
        assert_eq!(s, at(10, 0));
        assert_eq!(e, at(11, 0));
    }

    #[test]
    fn unrepresentable_duration_rejects_instead_of_panicking() {
        let policy = SlotPolicy {
            duration_minutes: i64::MAX,
            ..SlotPolicy::default()
        };
        let result = policy.validate(at(10, 0), at(11, 0), now());
        assert!(matches!(result, Err(MarketError::BadRequest(_))));
    }

    #[test]
    fn normalizes_to_hour_boundary() {
        let policy = SlotPolicy::default();
        let Ok((s, e)) = policy.validate(at(10, 25), at(11, 40), now()) else {
            panic!("expected valid slot");
        };
        assert_eq!(s, at(10, 0));
        assert_eq!(e, at(11, 0));
    }

    #[test]
    fn rejects_blackout_hour() {
        let policy = SlotPolicy::default();
        let start = at(23, 0);
        let result = policy.validate(start, start + TimeDelta::hours(1), now());
        assert!(matches!(result, Err(MarketError::BadRequest(_))));
    }

    #[test]
    fn blackout_can_be_disabled() {
        let policy = SlotPolicy {
            blackout_hour: None,
            ..SlotPolicy::default()
        };
        let start = at(23, 0);
        assert!(policy.validate(start, start + TimeDelta::hours(1), now()).is_ok());
    }

    #[test]
    fn rejects_wrong_duration() {
        let policy = SlotPolicy::default();
        assert!(policy.validate(at(10, 0), at(12, 0), now()).is_err());
        assert!(policy.validate(at(10, 0), at(10, 30), now()).is_err());
    }

    #[test]
    fn rejects_past_and_current_hour() {
        let policy = SlotPolicy::default();
        assert!(policy.validate(at(7, 0), at(8, 0), now()).is_err());
        // 08:30 normalizes to 08:00 which equals `now`.
        assert!(policy.validate(at(8, 30), at(9, 0), now()).is_err());
    }
}
