use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::storage::Storage;
use crate::types::{DeviceHealth, Quality};

/// Tracks the latest observed quality and value per (device, tag) pair.
///
/// This component only records; it never starts a diagnostic. The sequencer's
/// trigger policy polls `find_degraded` instead.
pub struct DeviceHealthTracker {
    storage: Arc<dyn Storage>,
}

impl DeviceHealthTracker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Upsert the record for the key: quality and check time always move,
    /// value and value time only when the poll carried a value.
    pub async fn record_observation(
        &self,
        device_id: &str,
        tag_id: &str,
        user_id: uuid::Uuid,
        value: Option<Value>,
        quality: Quality,
        observed_at: DateTime<Utc>,
    ) -> Result<DeviceHealth> {
        let record = match self.storage.get_health(device_id, tag_id).await? {
            Some(mut existing) => {
                existing.observe(quality, value, observed_at);
                existing
            }
            None => DeviceHealth::new(
                device_id.to_string(),
                tag_id.to_string(),
                user_id,
                quality,
                value,
                observed_at,
            ),
        };
        self.storage.upsert_health(&record).await?;
        Ok(record)
    }

    /// Same as `record_observation` with the quality still in adapter text
    /// form. A malformed quality is rejected before any write, so the prior
    /// record is untouched.
    pub async fn record_raw(
        &self,
        device_id: &str,
        tag_id: &str,
        user_id: uuid::Uuid,
        value: Option<Value>,
        quality: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<DeviceHealth> {
        let quality = Quality::parse(quality)?;
        self.record_observation(device_id, tag_id, user_id, value, quality, observed_at)
            .await
    }

    pub async fn get_health(&self, device_id: &str, tag_id: &str) -> Result<Option<DeviceHealth>> {
        self.storage.get_health(device_id, tag_id).await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Vec<DeviceHealth>> {
        self.storage.get_device_health(device_id).await
    }

    /// Records that warrant a diagnostic: degraded quality, or data staleness
    /// past the configured window.
    pub async fn find_degraded(
        &self,
        config: &PipelineConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeviceHealth>> {
        Ok(self
            .storage
            .list_health()
            .await?
            .into_iter()
            .filter(|h| h.is_degraded() || h.is_stale(config.staleness_window_secs, now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::Duration;
    use serde_json::json;
    use uuid::Uuid;

    fn tracker() -> DeviceHealthTracker {
        DeviceHealthTracker::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_first_observation_creates_record() {
        let t = tracker();
        let user = Uuid::new_v4();

        let record = t
            .record_observation("vue-1", "watts", user, Some(json!(240.1)), Quality::Good, Utc::now())
            .await
            .unwrap();

        assert_eq!(record.quality, Quality::Good);
        assert!(t.get_health("vue-1", "watts").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_observation_supersedes_previous() {
        let t = tracker();
        let user = Uuid::new_v4();

        t.record_observation("vue-1", "watts", user, Some(json!(240.1)), Quality::Good, Utc::now())
            .await
            .unwrap();
        t.record_observation("vue-1", "watts", user, None, Quality::Bad, Utc::now())
            .await
            .unwrap();

        let record = t.get_health("vue-1", "watts").await.unwrap().unwrap();
        assert_eq!(record.quality, Quality::Bad);
        // Value survives a value-less poll.
        assert_eq!(record.last_value, Some(json!(240.1)));
    }

    #[tokio::test]
    async fn test_malformed_quality_leaves_record_unchanged() {
        let t = tracker();
        let user = Uuid::new_v4();

        t.record_raw("vue-1", "watts", user, Some(json!(1.0)), "good", Utc::now())
            .await
            .unwrap();
        let result = t
            .record_raw("vue-1", "watts", user, Some(json!(2.0)), "splendid", Utc::now())
            .await;
        assert!(result.is_err());

        let record = t.get_health("vue-1", "watts").await.unwrap().unwrap();
        assert_eq!(record.last_value, Some(json!(1.0)));
        assert_eq!(record.quality, Quality::Good);
    }

    #[tokio::test]
    async fn test_get_health_miss_is_none() {
        let t = tracker();
        assert!(t.get_health("vue-404", "watts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_degraded_flags_bad_quality_and_staleness() {
        let storage = Arc::new(InMemoryStorage::new());
        let t = DeviceHealthTracker::new(storage.clone());
        let user = Uuid::new_v4();
        let now = Utc::now();

        t.record_observation("vue-ok", "watts", user, Some(json!(1.0)), Quality::Good, now)
            .await
            .unwrap();
        t.record_observation("vue-bad", "watts", user, Some(json!(1.0)), Quality::Bad, now)
            .await
            .unwrap();

        // Stale but nominally good quality.
        let mut stale = t
            .record_observation("vue-stale", "watts", user, Some(json!(1.0)), Quality::Good, now)
            .await
            .unwrap();
        stale.last_value_at = Some(now - Duration::seconds(3600));
        storage.upsert_health(&stale).await.unwrap();

        let config = PipelineConfig::default();
        let degraded = t.find_degraded(&config, now).await.unwrap();
        let ids: Vec<&str> = degraded.iter().map(|h| h.device_id.as_str()).collect();

        assert!(ids.contains(&"vue-bad"));
        assert!(ids.contains(&"vue-stale"));
        assert!(!ids.contains(&"vue-ok"));
    }
}
