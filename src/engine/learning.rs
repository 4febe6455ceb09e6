use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{MaintenanceConfig, PipelineConfig};
use crate::storage::Storage;
use crate::types::{Impact, LearningId, LearningUpdate, MaintenanceEvent};

/// Aggregates repeated issue patterns out of the maintenance log and emits
/// optimization suggestions. Updates are append-only facts; past
/// MaintenanceEvents are never rewritten.
pub struct LearningLoop {
    storage: Arc<dyn Storage>,
    config: PipelineConfig,
}

impl LearningLoop {
    pub fn new(storage: Arc<dyn Storage>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    /// One aggregation pass over the rolling window. A pattern that crossed
    /// the significance threshold yields one LearningUpdate per window; a
    /// pattern that already has an update in the window is skipped.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<Vec<LearningUpdate>> {
        let since = now - Duration::seconds(self.config.pattern_window_secs as i64);
        let events = self.storage.maintenance_events_since(since).await?;
        let existing = self.storage.learning_updates_since(since).await?;

        let mut groups: HashMap<(String, Option<String>), Vec<&MaintenanceEvent>> = HashMap::new();
        for event in &events {
            groups
                .entry((
                    event.issue.pattern().to_string(),
                    event.device_model.clone(),
                ))
                .or_default()
                .push(event);
        }

        let mut emitted = Vec::new();
        for ((pattern, correlation), group) in groups {
            if (group.len() as u32) < self.config.pattern_threshold {
                continue;
            }
            let already_reported = existing
                .iter()
                .any(|u| u.issue_pattern == pattern && u.device_correlation == correlation);
            if already_reported {
                continue;
            }

            let update = LearningUpdate {
                id: LearningId::new_v4(),
                optimization_suggestion: self.suggestion_for(&pattern, &correlation, &group),
                impact: self.impact_for(group.len() as u32),
                issue_pattern: pattern,
                device_correlation: correlation,
                timestamp: now,
            };
            log::info!(
                "learning update: {} ({} occurrences, impact {})",
                update.issue_pattern,
                group.len(),
                update.impact.as_str()
            );
            self.storage.append_learning_update(&update).await?;
            emitted.push(update);
        }
        Ok(emitted)
    }

    fn impact_for(&self, occurrences: u32) -> Impact {
        let threshold = self.config.pattern_threshold.max(1);
        if occurrences >= threshold * 3 {
            Impact::High
        } else if occurrences >= threshold * 2 {
            Impact::Medium
        } else {
            Impact::Low
        }
    }

    fn suggestion_for(
        &self,
        pattern: &str,
        correlation: &Option<String>,
        group: &[&MaintenanceEvent],
    ) -> String {
        let escalated = group
            .iter()
            .filter(|e| e.status == crate::types::MaintenanceStatus::Escalated)
            .count();
        let scope = match correlation {
            Some(model) => format!("{} devices", model),
            None => "affected devices".to_string(),
        };
        if escalated * 2 > group.len() {
            format!(
                "Recurring '{}' on {} mostly ends escalated; schedule a site check rather \
                 than waiting out further auto-repair cycles.",
                pattern, scope
            )
        } else {
            format!(
                "Recurring '{}' on {}; consider raising the polling interval or checking \
                 installation conditions to cut repeat incidents.",
                pattern, scope
            )
        }
    }

    /// Threshold tuning derived from the window's updates. Returns a
    /// validated proposal for the caller to persist, or None when nothing
    /// would change. Nothing is applied behind the admin's back.
    pub fn recommend_config(
        &self,
        current: &MaintenanceConfig,
        updates: &[LearningUpdate],
    ) -> Option<MaintenanceConfig> {
        let high_impact = updates.iter().filter(|u| u.impact == Impact::High).count();
        if high_impact == 0 {
            return None;
        }
        // Hot patterns should reach humans sooner.
        let proposed = MaintenanceConfig {
            alert_escalation_threshold: current.alert_escalation_threshold.saturating_sub(1).max(1),
            ..current.clone()
        };
        if proposed == *current || proposed.validate().is_err() {
            return None;
        }
        Some(proposed)
    }

    /// Dashboard suggestion strip: most recent suggestion per pattern.
    pub fn suggestions(updates: &[LearningUpdate]) -> Vec<String> {
        let mut sorted: Vec<&LearningUpdate> = updates.iter().collect();
        sorted.sort_by_key(|u| std::cmp::Reverse(u.timestamp));

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for update in sorted {
            if seen.insert(update.issue_pattern.clone()) {
                out.push(update.optimization_suggestion.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::{IssueKind, MaintenanceId, MaintenanceStatus};
    use uuid::Uuid;

    fn maintenance_event(
        issue: IssueKind,
        model: Option<&str>,
        status: MaintenanceStatus,
        at: DateTime<Utc>,
    ) -> MaintenanceEvent {
        MaintenanceEvent {
            id: MaintenanceId::new_v4(),
            service: "device-integration".to_string(),
            device_id: "vue-1".to_string(),
            tag_id: "watts".to_string(),
            issue,
            status,
            resolution: None,
            root_cause: None,
            retry_count: 0,
            time_to_resolution_secs: 30,
            timestamp: at,
            diagnostic_id: Uuid::new_v4(),
            device_model: model.map(|m| m.to_string()),
        }
    }

    async fn seeded_loop(events: Vec<MaintenanceEvent>) -> (LearningLoop, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        for event in &events {
            storage.append_maintenance_event(event).await.unwrap();
        }
        (
            LearningLoop::new(storage.clone(), PipelineConfig::default()),
            storage,
        )
    }

    #[tokio::test]
    async fn test_pattern_below_threshold_is_silent() {
        let now = Utc::now();
        let (learning, _) = seeded_loop(vec![
            maintenance_event(IssueKind::ConnectivityLoss, Some("Emporia Vue"), MaintenanceStatus::Resolved, now),
            maintenance_event(IssueKind::ConnectivityLoss, Some("Emporia Vue"), MaintenanceStatus::Resolved, now),
        ])
        .await;

        let updates = learning.run_once(now).await.unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn test_pattern_at_threshold_emits_once() {
        let now = Utc::now();
        let events: Vec<_> = (0..5)
            .map(|i| {
                maintenance_event(
                    IssueKind::ConnectivityLoss,
                    Some("Emporia Vue"),
                    MaintenanceStatus::Resolved,
                    now - Duration::hours(i),
                )
            })
            .collect();
        let (learning, _) = seeded_loop(events).await;

        let first = learning.run_once(now).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].issue_pattern, "device unreachable");
        assert_eq!(first[0].device_correlation.as_deref(), Some("Emporia Vue"));

        // Second pass inside the same window stays quiet.
        let second = learning.run_once(now).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_impact_scales_with_frequency() {
        let now = Utc::now();
        let events: Vec<_> = (0..9)
            .map(|i| {
                maintenance_event(
                    IssueKind::ProtocolFault,
                    Some("Siemens S7"),
                    MaintenanceStatus::Escalated,
                    now - Duration::minutes(i),
                )
            })
            .collect();
        let (learning, _) = seeded_loop(events).await;

        let updates = learning.run_once(now).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].impact, Impact::High);
    }

    #[tokio::test]
    async fn test_distinct_correlations_emit_separately() {
        let now = Utc::now();
        let mut events = Vec::new();
        for model in ["Emporia Vue", "Sense Monitor"] {
            for i in 0..3 {
                events.push(maintenance_event(
                    IssueKind::StaleData,
                    Some(model),
                    MaintenanceStatus::Resolved,
                    now - Duration::minutes(i),
                ));
            }
        }
        let (learning, _) = seeded_loop(events).await;

        let updates = learning.run_once(now).await.unwrap();
        assert_eq!(updates.len(), 2);
    }

    #[test]
    fn test_suggestions_dedup_by_pattern() {
        let now = Utc::now();
        let mk = |pattern: &str, suggestion: &str, at: DateTime<Utc>| LearningUpdate {
            id: LearningId::new_v4(),
            issue_pattern: pattern.to_string(),
            optimization_suggestion: suggestion.to_string(),
            device_correlation: None,
            impact: Impact::Low,
            timestamp: at,
        };
        let updates = vec![
            mk("stale telemetry", "older suggestion", now - Duration::hours(2)),
            mk("stale telemetry", "newer suggestion", now),
            mk("device unreachable", "check wiring", now),
        ];

        let suggestions = LearningLoop::suggestions(&updates);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.contains(&"newer suggestion".to_string()));
        assert!(!suggestions.contains(&"older suggestion".to_string()));
    }

    #[test]
    fn test_recommend_config_only_on_high_impact() {
        let storage = Arc::new(InMemoryStorage::new());
        let learning = LearningLoop::new(storage, PipelineConfig::default());
        let current = MaintenanceConfig::default();

        let low = vec![LearningUpdate {
            id: LearningId::new_v4(),
            issue_pattern: "stale telemetry".to_string(),
            optimization_suggestion: "s".to_string(),
            device_correlation: None,
            impact: Impact::Low,
            timestamp: Utc::now(),
        }];
        assert!(learning.recommend_config(&current, &low).is_none());

        let high = vec![LearningUpdate {
            impact: Impact::High,
            ..low[0].clone()
        }];
        let proposal = learning.recommend_config(&current, &high).unwrap();
        assert_eq!(
            proposal.alert_escalation_threshold,
            current.alert_escalation_threshold - 1
        );
        assert!(proposal.validate().is_ok());
    }
}
