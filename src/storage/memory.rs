use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::catalog::ErrorCode;
use crate::config::MaintenanceConfig;
use crate::storage::traits::Storage;
use crate::types::{
    DeviceHealth, DiagnosticEvent, DiagnosticFeedback, DiagnosticId, LearningUpdate,
    MaintenanceEvent,
};

/// In-memory backend for embedding and tests.
#[derive(Clone)]
pub struct InMemoryStorage {
    health: Arc<RwLock<HashMap<(String, String), DeviceHealth>>>,
    diagnostics: Arc<RwLock<HashMap<DiagnosticId, DiagnosticEvent>>>,
    feedback: Arc<RwLock<HashMap<DiagnosticId, Vec<DiagnosticFeedback>>>>,
    error_codes: Arc<RwLock<HashMap<(String, String), ErrorCode>>>,
    maintenance: Arc<RwLock<Vec<MaintenanceEvent>>>,
    learning: Arc<RwLock<Vec<LearningUpdate>>>,
    config: Arc<RwLock<MaintenanceConfig>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            health: Arc::new(RwLock::new(HashMap::new())),
            diagnostics: Arc::new(RwLock::new(HashMap::new())),
            feedback: Arc::new(RwLock::new(HashMap::new())),
            error_codes: Arc::new(RwLock::new(HashMap::new())),
            maintenance: Arc::new(RwLock::new(Vec::new())),
            learning: Arc::new(RwLock::new(Vec::new())),
            config: Arc::new(RwLock::new(MaintenanceConfig::default())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_health(&self, health: &DeviceHealth) -> Result<()> {
        let mut table = self.health.write().unwrap();
        table.insert(
            (health.device_id.clone(), health.tag_id.clone()),
            health.clone(),
        );
        Ok(())
    }

    async fn get_health(&self, device_id: &str, tag_id: &str) -> Result<Option<DeviceHealth>> {
        let table = self.health.read().unwrap();
        Ok(table
            .get(&(device_id.to_string(), tag_id.to_string()))
            .cloned())
    }

    async fn get_device_health(&self, device_id: &str) -> Result<Vec<DeviceHealth>> {
        let table = self.health.read().unwrap();
        Ok(table
            .values()
            .filter(|h| h.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn list_health(&self) -> Result<Vec<DeviceHealth>> {
        let table = self.health.read().unwrap();
        Ok(table.values().cloned().collect())
    }

    async fn create_diagnostic(&self, event: &DiagnosticEvent) -> Result<()> {
        let mut table = self.diagnostics.write().unwrap();
        table.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_diagnostic(&self, event: &DiagnosticEvent) -> Result<()> {
        let mut table = self.diagnostics.write().unwrap();
        table.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_diagnostic(&self, id: DiagnosticId) -> Result<Option<DiagnosticEvent>> {
        let table = self.diagnostics.read().unwrap();
        Ok(table.get(&id).cloned())
    }

    async fn get_active_diagnostic(
        &self,
        device_id: &str,
        tag_id: &str,
    ) -> Result<Option<DiagnosticEvent>> {
        let table = self.diagnostics.read().unwrap();
        Ok(table
            .values()
            .find(|e| e.device_id == device_id && e.tag_id == tag_id && !e.is_terminal())
            .cloned())
    }

    async fn add_feedback(&self, feedback: &DiagnosticFeedback) -> Result<()> {
        let mut table = self.feedback.write().unwrap();
        table
            .entry(feedback.event_id)
            .or_default()
            .push(feedback.clone());
        Ok(())
    }

    async fn get_feedback(&self, event_id: DiagnosticId) -> Result<Vec<DiagnosticFeedback>> {
        let table = self.feedback.read().unwrap();
        Ok(table.get(&event_id).cloned().unwrap_or_default())
    }

    async fn upsert_error_code(&self, entry: &ErrorCode) -> Result<()> {
        let mut table = self.error_codes.write().unwrap();
        table.insert(
            (entry.code.clone(), entry.manufacturer.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn get_error_code(&self, code: &str, manufacturer: &str) -> Result<Option<ErrorCode>> {
        let table = self.error_codes.read().unwrap();
        Ok(table
            .get(&(code.to_string(), manufacturer.to_string()))
            .cloned())
    }

    async fn list_error_codes(&self) -> Result<Vec<ErrorCode>> {
        let table = self.error_codes.read().unwrap();
        Ok(table.values().cloned().collect())
    }

    async fn append_maintenance_event(&self, event: &MaintenanceEvent) -> Result<()> {
        let mut log = self.maintenance.write().unwrap();
        log.push(event.clone());
        Ok(())
    }

    async fn maintenance_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceEvent>> {
        let log = self.maintenance.read().unwrap();
        Ok(log.iter().filter(|e| e.timestamp >= since).cloned().collect())
    }

    async fn append_learning_update(&self, update: &LearningUpdate) -> Result<()> {
        let mut log = self.learning.write().unwrap();
        log.push(update.clone());
        Ok(())
    }

    async fn learning_updates_since(&self, since: DateTime<Utc>) -> Result<Vec<LearningUpdate>> {
        let log = self.learning.read().unwrap();
        Ok(log.iter().filter(|u| u.timestamp >= since).cloned().collect())
    }

    async fn get_config(&self) -> Result<MaintenanceConfig> {
        let cfg = self.config.read().unwrap();
        Ok(cfg.clone())
    }

    async fn put_config(&self, config: &MaintenanceConfig) -> Result<()> {
        config.validate()?;
        let mut cfg = self.config.write().unwrap();
        *cfg = config.clone();
        Ok(())
    }
}
