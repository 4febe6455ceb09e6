use anyhow::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::DeviceAdapter;
use crate::engine::sequencer::{classify, DiagnosticSequencer};
use crate::config::PipelineConfig;
use crate::storage::Storage;
use crate::types::{
    DiagnosticEvent, DiagnosticStatus, IssueKind, MaintenanceEvent, MaintenanceId,
    MaintenanceStatus,
};

/// Subsystem a failure mode is charged to on the maintenance log.
pub fn service_for(issue: IssueKind) -> &'static str {
    match issue {
        IssueKind::ConnectivityLoss => "network",
        IssueKind::ProtocolFault | IssueKind::TagReadFailure | IssueKind::Intermittent => {
            "device-integration"
        }
        IssueKind::StaleData => "data-sync",
        IssueKind::Unknown => "backend",
    }
}

/// Decides what to do with a concluded diagnostic: auto-repair, bounded
/// retry, or escalate. Every `handle` call appends exactly one
/// MaintenanceEvent, and an escalated event is never touched again.
pub struct MaintenanceEngine {
    storage: Arc<dyn Storage>,
    adapter: Arc<dyn DeviceAdapter>,
    sequencer: Arc<DiagnosticSequencer>,
    config: PipelineConfig,
    in_flight: Mutex<HashSet<(String, String)>>,
    repair_log: Mutex<HashMap<IssueKind, Vec<chrono::DateTime<Utc>>>>,
}

impl MaintenanceEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        adapter: Arc<dyn DeviceAdapter>,
        sequencer: Arc<DiagnosticSequencer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            adapter,
            sequencer,
            config,
            in_flight: Mutex::new(HashSet::new()),
            repair_log: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one concluded diagnostic. Decisions for the same
    /// (device, tag) key are serialized; a second call queues until the
    /// first one's outcome is written.
    pub async fn handle(&self, diagnostic: &DiagnosticEvent) -> Result<MaintenanceEvent> {
        let key = (diagnostic.device_id.clone(), diagnostic.tag_id.clone());
        while !self.begin(&key) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let result = self.decide(diagnostic).await;
        self.end(&key);
        result
    }

    fn begin(&self, key: &(String, String)) -> bool {
        let mut guard = self.in_flight.lock().unwrap();
        guard.insert(key.clone())
    }

    fn end(&self, key: &(String, String)) {
        let mut guard = self.in_flight.lock().unwrap();
        guard.remove(key);
    }

    async fn decide(&self, diagnostic: &DiagnosticEvent) -> Result<MaintenanceEvent> {
        // Config snapshot for the whole decision; a concurrent tuning write
        // lands on the next incident.
        let cfg = self.storage.get_config().await?;
        let issue = classify(diagnostic);
        let device_model = self
            .adapter
            .device_model(&diagnostic.device_id)
            .await
            .unwrap_or(None);

        if !cfg.is_active {
            log::warn!(
                "self-healing disabled; escalating {} on {}/{}",
                issue.as_str(),
                diagnostic.device_id,
                diagnostic.tag_id
            );
            return self
                .finish(
                    diagnostic,
                    issue,
                    device_model,
                    MaintenanceStatus::Escalated,
                    None,
                    Some("self-healing is switched off".to_string()),
                    0,
                )
                .await;
        }

        // Rule 1: auto-repair, budget-gated per issue kind.
        if diagnostic.status == DiagnosticStatus::Diagnosed
            && issue.auto_repairable()
            && self.repair_budget_left(issue, cfg.auto_repair_threshold)
        {
            if let Some(resolution) = self.try_repair(&diagnostic.device_id, issue).await {
                return self
                    .finish(
                        diagnostic,
                        issue,
                        device_model,
                        MaintenanceStatus::Resolved,
                        Some(resolution),
                        Some(diagnostic.diagnosis.clone()),
                        0,
                    )
                    .await;
            }
        }

        // Chronic recurrence forgoes the retry loop entirely.
        let recurrence = self
            .recurrence_count(&diagnostic.device_id, &diagnostic.tag_id, issue)
            .await?;
        if recurrence > cfg.alert_escalation_threshold as usize {
            log::warn!(
                "{} recurrences of {} on {}/{}; escalating",
                recurrence,
                issue.as_str(),
                diagnostic.device_id,
                diagnostic.tag_id
            );
            return self
                .finish(
                    diagnostic,
                    issue,
                    device_model,
                    MaintenanceStatus::Escalated,
                    None,
                    Some(format!(
                        "{} recurrences of {} exceeded the escalation threshold",
                        recurrence,
                        issue.pattern()
                    )),
                    0,
                )
                .await;
        }

        // Rule 2: bounded retries, each one a full re-diagnosis.
        let mut retry_count = 0u32;
        while retry_count < cfg.max_retries {
            retry_count += 1;
            log::info!(
                "retry {}/{} for {}/{}",
                retry_count,
                cfg.max_retries,
                diagnostic.device_id,
                diagnostic.tag_id
            );

            let health = match self
                .storage
                .get_health(&diagnostic.device_id, &diagnostic.tag_id)
                .await?
            {
                Some(h) => h,
                None => break,
            };
            let rerun = self.sequencer.trigger(&health).await?;
            if !rerun.is_terminal() {
                // Coalesced into a sequence another trigger still owns; its
                // snapshot proves nothing yet.
                continue;
            }

            if !rerun.any_failed() {
                return self
                    .finish(
                        diagnostic,
                        issue,
                        device_model,
                        MaintenanceStatus::Resolved,
                        Some(format!("all checks passed on retry {}", retry_count)),
                        Some(diagnostic.diagnosis.clone()),
                        retry_count,
                    )
                    .await;
            }

            if rerun.status == DiagnosticStatus::Diagnosed
                && issue.auto_repairable()
                && self.repair_budget_left(issue, cfg.auto_repair_threshold)
            {
                if let Some(resolution) = self.try_repair(&diagnostic.device_id, issue).await {
                    return self
                        .finish(
                            diagnostic,
                            issue,
                            device_model,
                            MaintenanceStatus::Resolved,
                            Some(resolution),
                            Some(diagnostic.diagnosis.clone()),
                            retry_count,
                        )
                        .await;
                }
            }
        }

        // Rule 3: policy exhausted. Terminal and human-visible.
        self.finish(
            diagnostic,
            issue,
            device_model,
            MaintenanceStatus::Escalated,
            None,
            Some(format!("unresolved after {} retries", retry_count)),
            retry_count,
        )
        .await
    }

    /// Repair attempts for the kind within the rolling window, against the
    /// configured budget. Every attempt counts, successful or not.
    fn repair_budget_left(&self, issue: IssueKind, threshold: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.repair_window_secs as i64);
        let mut log = self.repair_log.lock().unwrap();
        let attempts = log.entry(issue).or_default();
        attempts.retain(|t| *t > cutoff);
        (attempts.len() as u32) < threshold
    }

    async fn try_repair(&self, device_id: &str, issue: IssueKind) -> Option<String> {
        {
            let mut log = self.repair_log.lock().unwrap();
            log.entry(issue).or_default().push(Utc::now());
        }

        let budget = Duration::from_secs(self.config.step_timeout_secs);
        match tokio::time::timeout(budget, self.adapter.attempt_repair(device_id, issue)).await {
            Ok(Ok(outcome)) if outcome.ok => {
                log::info!("auto-repair of {} on {} succeeded", issue.as_str(), device_id);
                Some(outcome.detail)
            }
            Ok(Ok(outcome)) => {
                log::warn!(
                    "auto-repair of {} on {} failed: {}",
                    issue.as_str(),
                    device_id,
                    outcome.detail
                );
                None
            }
            Ok(Err(e)) => {
                log::warn!("auto-repair adapter unreachable for {}: {}", device_id, e);
                None
            }
            Err(_) => {
                log::warn!("auto-repair of {} on {} timed out", issue.as_str(), device_id);
                None
            }
        }
    }

    async fn recurrence_count(
        &self,
        device_id: &str,
        tag_id: &str,
        issue: IssueKind,
    ) -> Result<usize> {
        let since = Utc::now() - chrono::Duration::seconds(self.config.recent_window_secs as i64);
        let events = self.storage.maintenance_events_since(since).await?;
        Ok(events
            .iter()
            .filter(|e| e.device_id == device_id && e.tag_id == tag_id && e.issue == issue)
            .count())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        diagnostic: &DiagnosticEvent,
        issue: IssueKind,
        device_model: Option<String>,
        status: MaintenanceStatus,
        resolution: Option<String>,
        root_cause: Option<String>,
        retry_count: u32,
    ) -> Result<MaintenanceEvent> {
        let now = Utc::now();
        let event = MaintenanceEvent {
            id: MaintenanceId::new_v4(),
            service: service_for(issue).to_string(),
            device_id: diagnostic.device_id.clone(),
            tag_id: diagnostic.tag_id.clone(),
            issue,
            status,
            resolution,
            root_cause,
            retry_count,
            time_to_resolution_secs: now
                .signed_duration_since(diagnostic.started_at)
                .num_seconds(),
            timestamp: now,
            diagnostic_id: diagnostic.id,
            device_model,
        };
        self.storage.append_maintenance_event(&event).await?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_charging() {
        assert_eq!(service_for(IssueKind::ConnectivityLoss), "network");
        assert_eq!(service_for(IssueKind::ProtocolFault), "device-integration");
        assert_eq!(service_for(IssueKind::TagReadFailure), "device-integration");
        assert_eq!(service_for(IssueKind::StaleData), "data-sync");
        assert_eq!(service_for(IssueKind::Unknown), "backend");
    }
}
