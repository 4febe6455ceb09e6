use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DeviceId, Quality, TagId, UserId};

/// Latest observed state of one (device, tag) pair.
///
/// `last_checked_at` advances on every poll; `last_value_at` only when the
/// poll carried a fresh value. A check without a value is how staleness
/// becomes visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealth {
    pub device_id: DeviceId,
    pub tag_id: TagId,
    pub user_id: UserId,
    pub quality: Quality,
    pub last_value: Option<Value>,
    pub last_value_at: Option<DateTime<Utc>>,
    pub last_checked_at: DateTime<Utc>,
}

impl DeviceHealth {
    pub fn new(
        device_id: DeviceId,
        tag_id: TagId,
        user_id: UserId,
        quality: Quality,
        value: Option<Value>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id,
            tag_id,
            user_id,
            quality,
            last_value_at: value.as_ref().map(|_| observed_at),
            last_value: value,
            last_checked_at: Utc::now(),
        }
    }

    /// Apply a fresh observation on top of the stored record.
    pub fn observe(&mut self, quality: Quality, value: Option<Value>, observed_at: DateTime<Utc>) {
        self.quality = quality;
        if let Some(v) = value {
            self.last_value = Some(v);
            self.last_value_at = Some(observed_at);
        }
        self.last_checked_at = Utc::now();
    }

    pub fn is_degraded(&self) -> bool {
        self.quality != Quality::Good
    }

    /// Stale when no value has arrived within the window. A record that has
    /// never carried a value counts as stale.
    pub fn is_stale(&self, window_secs: u64, now: DateTime<Utc>) -> bool {
        match self.last_value_at {
            Some(at) => now.signed_duration_since(at) > Duration::seconds(window_secs as i64),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn record(quality: Quality) -> DeviceHealth {
        DeviceHealth::new(
            "vue-1021".to_string(),
            "channel_3_watts".to_string(),
            Uuid::new_v4(),
            quality,
            Some(json!(412.5)),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_sets_value_timestamp() {
        let h = record(Quality::Good);
        assert!(h.last_value_at.is_some());
        assert_eq!(h.last_value, Some(json!(412.5)));
    }

    #[test]
    fn test_observe_without_value_keeps_last_value() {
        let mut h = record(Quality::Good);
        let before = h.last_value_at;
        h.observe(Quality::Uncertain, None, Utc::now());
        assert_eq!(h.quality, Quality::Uncertain);
        assert_eq!(h.last_value_at, before);
        assert_eq!(h.last_value, Some(json!(412.5)));
    }

    #[test]
    fn test_degraded() {
        assert!(!record(Quality::Good).is_degraded());
        assert!(record(Quality::Bad).is_degraded());
        assert!(record(Quality::Uncertain).is_degraded());
    }

    #[test]
    fn test_staleness() {
        let mut h = record(Quality::Good);
        let now = Utc::now();
        assert!(!h.is_stale(900, now));

        h.last_value_at = Some(now - Duration::seconds(1000));
        assert!(h.is_stale(900, now));

        h.last_value_at = None;
        assert!(h.is_stale(900, now));
    }
}
