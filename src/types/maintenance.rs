use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    DeviceId, DiagnosticId, Impact, IssueKind, LearningId, MaintenanceId, MaintenanceStatus,
    ServiceStatus, TagId,
};
use crate::config::MaintenanceConfig;

/// One resolved or abandoned incident, written by the maintenance engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceEvent {
    pub id: MaintenanceId,
    pub service: String,
    pub device_id: DeviceId,
    pub tag_id: TagId,
    pub issue: IssueKind,
    pub status: MaintenanceStatus,
    pub resolution: Option<String>,
    pub root_cause: Option<String>,
    pub retry_count: u32,
    pub time_to_resolution_secs: i64,
    pub timestamp: DateTime<Utc>,
    pub diagnostic_id: DiagnosticId,
    pub device_model: Option<String>,
}

impl MaintenanceEvent {
    /// Final resolution time for terminal events. For an in-progress entry
    /// the stored value is elapsed-at-write, so the answer keeps growing
    /// until the status turns terminal; callers must read the status
    /// alongside it.
    pub fn time_to_resolution_at(&self, now: DateTime<Utc>) -> i64 {
        if self.status.is_terminal() {
            self.time_to_resolution_secs
        } else {
            self.time_to_resolution_secs + now.signed_duration_since(self.timestamp).num_seconds()
        }
    }
}

/// Derived optimization fact emitted by the learning loop. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningUpdate {
    pub id: LearningId,
    pub issue_pattern: String,
    pub optimization_suggestion: String,
    pub device_correlation: Option<String>,
    pub impact: Impact,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate platform health snapshot.
///
/// `overall` is always the severity reduction of the four subsystem
/// statuses; construct through `from_parts` so the invariant holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub network: ServiceStatus,
    pub device_integration: ServiceStatus,
    pub data_sync: ServiceStatus,
    pub backend: ServiceStatus,
    pub overall: ServiceStatus,
    pub uptime_percent: f64,
    pub active_processes: Vec<String>,
    pub performance_notes: String,
    pub captured_at: DateTime<Utc>,
}

impl SystemHealth {
    pub fn from_parts(
        network: ServiceStatus,
        device_integration: ServiceStatus,
        data_sync: ServiceStatus,
        backend: ServiceStatus,
        uptime_percent: f64,
        active_processes: Vec<String>,
        performance_notes: String,
    ) -> Self {
        let overall = Self::reduce([network, device_integration, data_sync, backend]);
        Self {
            network,
            device_integration,
            data_sync,
            backend,
            overall,
            uptime_percent,
            active_processes,
            performance_notes,
            captured_at: Utc::now(),
        }
    }

    /// Worst-of reduction: Unhealthy > Degraded > Healthy. Unknown inputs
    /// carry no severity; all-unknown reduces to Unknown.
    pub fn reduce(parts: [ServiceStatus; 4]) -> ServiceStatus {
        parts
            .into_iter()
            .filter(|s| *s != ServiceStatus::Unknown)
            .max_by_key(|s| s.severity())
            .unwrap_or(ServiceStatus::Unknown)
    }
}

/// Read-only composite for the operations dashboard. Assembled on demand,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceDashboard {
    pub system_health: SystemHealth,
    pub recent_events: Vec<MaintenanceEvent>,
    pub learning_updates: Vec<LearningUpdate>,
    pub suggestions: Vec<String>,
    pub config: MaintenanceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_worst_constituent() {
        let h = SystemHealth::from_parts(
            ServiceStatus::Healthy,
            ServiceStatus::Degraded,
            ServiceStatus::Healthy,
            ServiceStatus::Unhealthy,
            99.2,
            vec!["ingest".to_string()],
            String::new(),
        );
        assert_eq!(h.overall, ServiceStatus::Unhealthy);
    }

    #[test]
    fn test_unknown_does_not_mask_healthy() {
        let overall = SystemHealth::reduce([
            ServiceStatus::Unknown,
            ServiceStatus::Healthy,
            ServiceStatus::Unknown,
            ServiceStatus::Healthy,
        ]);
        assert_eq!(overall, ServiceStatus::Healthy);
    }

    #[test]
    fn test_all_unknown_reduces_to_unknown() {
        let overall = SystemHealth::reduce([ServiceStatus::Unknown; 4]);
        assert_eq!(overall, ServiceStatus::Unknown);
    }

    #[test]
    fn test_time_to_resolution_tracks_status() {
        use super::super::{IssueKind, MaintenanceStatus};
        use chrono::Duration;
        use uuid::Uuid;

        let now = Utc::now();
        let mut event = MaintenanceEvent {
            id: Uuid::new_v4(),
            service: "network".to_string(),
            device_id: "vue-1".to_string(),
            tag_id: "watts".to_string(),
            issue: IssueKind::ConnectivityLoss,
            status: MaintenanceStatus::InProgress,
            resolution: None,
            root_cause: None,
            retry_count: 1,
            time_to_resolution_secs: 40,
            timestamp: now - Duration::seconds(20),
            diagnostic_id: Uuid::new_v4(),
            device_model: None,
        };

        // Still running: elapsed keeps growing past the written value.
        assert_eq!(event.time_to_resolution_at(now), 60);

        event.status = MaintenanceStatus::Resolved;
        assert_eq!(event.time_to_resolution_at(now), 40);
    }

    #[test]
    fn test_degraded_beats_healthy() {
        let overall = SystemHealth::reduce([
            ServiceStatus::Healthy,
            ServiceStatus::Healthy,
            ServiceStatus::Degraded,
            ServiceStatus::Unknown,
        ]);
        assert_eq!(overall, ServiceStatus::Degraded);
    }
}
