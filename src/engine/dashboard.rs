use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::adapters::DeviceAdapter;
use crate::config::PipelineConfig;
use crate::engine::learning::LearningLoop;
use crate::storage::Storage;
use crate::types::{MaintenanceDashboard, ServiceStatus, SystemHealth};

/// Builds the read-only operations view on demand. Nothing here is
/// persisted; callers get a fresh composite per call.
pub struct DashboardAssembler {
    storage: Arc<dyn Storage>,
    adapter: Arc<dyn DeviceAdapter>,
    config: PipelineConfig,
}

impl DashboardAssembler {
    pub fn new(
        storage: Arc<dyn Storage>,
        adapter: Arc<dyn DeviceAdapter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            adapter,
            config,
        }
    }

    pub async fn assemble(&self) -> Result<MaintenanceDashboard> {
        let system_health = self.capture_system_health().await;

        let since = Utc::now() - Duration::seconds(self.config.recent_window_secs as i64);
        let mut recent_events = self.storage.maintenance_events_since(since).await?;
        recent_events.sort_by_key(|e| std::cmp::Reverse(e.timestamp));

        let learning_updates = self.storage.learning_updates_since(since).await?;
        let suggestions = LearningLoop::suggestions(&learning_updates);
        let config = self.storage.get_config().await?;

        Ok(MaintenanceDashboard {
            system_health,
            recent_events,
            learning_updates,
            suggestions,
            config,
        })
    }

    /// An unreachable platform probe degrades to an all-unknown snapshot
    /// instead of failing the whole dashboard.
    async fn capture_system_health(&self) -> SystemHealth {
        match self.adapter.system_probe().await {
            Ok(probe) => SystemHealth::from_parts(
                probe.network,
                probe.device_integration,
                probe.data_sync,
                probe.backend,
                probe.uptime_percent,
                probe.active_processes,
                probe.performance_notes,
            ),
            Err(e) => {
                log::warn!("platform probe failed: {}", e);
                SystemHealth::from_parts(
                    ServiceStatus::Unknown,
                    ServiceStatus::Unknown,
                    ServiceStatus::Unknown,
                    ServiceStatus::Unknown,
                    0.0,
                    Vec::new(),
                    format!("platform probe failed: {}", e),
                )
            }
        }
    }
}
