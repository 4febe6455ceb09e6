use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::ErrorCode;
use crate::config::MaintenanceConfig;
use crate::types::{
    DeviceHealth, DiagnosticEvent, DiagnosticFeedback, DiagnosticId, LearningUpdate,
    MaintenanceEvent,
};

/// Key-addressable record store behind the pipeline. The in-memory backend
/// is the embedded default; the Postgres backend serves deployments.
#[async_trait]
pub trait Storage: Send + Sync {
    // Device health
    async fn upsert_health(&self, health: &DeviceHealth) -> Result<()>;
    async fn get_health(&self, device_id: &str, tag_id: &str) -> Result<Option<DeviceHealth>>;
    async fn get_device_health(&self, device_id: &str) -> Result<Vec<DeviceHealth>>;
    async fn list_health(&self) -> Result<Vec<DeviceHealth>>;

    // Diagnostic events
    async fn create_diagnostic(&self, event: &DiagnosticEvent) -> Result<()>;
    async fn update_diagnostic(&self, event: &DiagnosticEvent) -> Result<()>;
    async fn get_diagnostic(&self, id: DiagnosticId) -> Result<Option<DiagnosticEvent>>;
    async fn get_active_diagnostic(
        &self,
        device_id: &str,
        tag_id: &str,
    ) -> Result<Option<DiagnosticEvent>>;

    // Diagnostic feedback
    async fn add_feedback(&self, feedback: &DiagnosticFeedback) -> Result<()>;
    async fn get_feedback(&self, event_id: DiagnosticId) -> Result<Vec<DiagnosticFeedback>>;

    // Error code catalog
    async fn upsert_error_code(&self, entry: &ErrorCode) -> Result<()>;
    async fn get_error_code(&self, code: &str, manufacturer: &str) -> Result<Option<ErrorCode>>;
    async fn list_error_codes(&self) -> Result<Vec<ErrorCode>>;

    // Maintenance log
    async fn append_maintenance_event(&self, event: &MaintenanceEvent) -> Result<()>;
    async fn maintenance_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceEvent>>;

    // Learning updates
    async fn append_learning_update(&self, update: &LearningUpdate) -> Result<()>;
    async fn learning_updates_since(&self, since: DateTime<Utc>) -> Result<Vec<LearningUpdate>>;

    // Maintenance config (process-wide singleton)
    async fn get_config(&self) -> Result<MaintenanceConfig>;
    async fn put_config(&self, config: &MaintenanceConfig) -> Result<()>;
}
