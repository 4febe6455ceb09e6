use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::{DeviceAdapter, ProbeOutcome};
use crate::catalog::ErrorCodeCatalog;
use crate::config::PipelineConfig;
use crate::storage::Storage;
use crate::types::{
    CheckStatus, CheckType, DeviceHealth, DiagnosticEvent, DiagnosticStatus, IssueKind, Quality,
    ServiceStatus, SystemHealth,
};

/// Runs the fixed diagnostic sequence for a degraded (device, tag) pair.
///
/// Checks are diagnostic, not gating: a failing step never short-circuits
/// the sequence, because classification needs the full picture. The sequence
/// always reaches a terminal state, even when every probe is unreachable.
pub struct DiagnosticSequencer {
    storage: Arc<dyn Storage>,
    adapter: Arc<dyn DeviceAdapter>,
    catalog: ErrorCodeCatalog,
    config: PipelineConfig,
    in_flight: Mutex<HashSet<(String, String)>>,
}

impl DiagnosticSequencer {
    pub fn new(
        storage: Arc<dyn Storage>,
        adapter: Arc<dyn DeviceAdapter>,
        config: PipelineConfig,
    ) -> Self {
        let catalog = ErrorCodeCatalog::new(storage.clone());
        Self {
            storage,
            adapter,
            catalog,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run the diagnostic for a degraded record, or coalesce into the
    /// incident already in flight for the same key.
    pub async fn trigger(&self, health: &DeviceHealth) -> Result<DiagnosticEvent> {
        let key = (health.device_id.clone(), health.tag_id.clone());

        loop {
            if let Some(existing) = self
                .storage
                .get_active_diagnostic(&health.device_id, &health.tag_id)
                .await?
            {
                return Ok(existing);
            }
            if self.begin(&key) {
                break;
            }
            // Another task is creating the event; its record becomes
            // visible on the next pass.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let result = self.run(health).await;
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

    async fn run(&self, health: &DeviceHealth) -> Result<DiagnosticEvent> {
        let mut event = DiagnosticEvent::new(
            health.device_id.clone(),
            health.tag_id.clone(),
            health.user_id,
            health.quality,
        );
        event.status = DiagnosticStatus::InProgress;
        self.storage.create_diagnostic(&event).await?;

        for check in CheckType::SEQUENCE {
            let (status, message, code) = self.run_check(check, health).await;
            if event.error_code.is_none() {
                if let Some((code, manufacturer)) = code {
                    event.error_code = Some(code);
                    event.manufacturer = Some(manufacturer);
                }
            }
            event.record_check(check, status, message);
            self.storage.update_diagnostic(&event).await?;
        }

        self.conclude(&mut event).await?;
        self.storage.update_diagnostic(&event).await?;
        Ok(event)
    }

    /// One bounded probe. Timeouts and adapter errors become failed check
    /// results, never aborts.
    async fn run_check(
        &self,
        check: CheckType,
        health: &DeviceHealth,
    ) -> (CheckStatus, String, Option<(String, String)>) {
        let budget = Duration::from_secs(self.config.step_timeout_secs);

        match tokio::time::timeout(budget, self.probe(check, health)).await {
            Err(_) => {
                log::warn!(
                    "{} probe for {}/{} timed out after {}s",
                    check.as_str(),
                    health.device_id,
                    health.tag_id,
                    self.config.step_timeout_secs
                );
                (
                    CheckStatus::Fail,
                    format!(
                        "{} probe timed out after {}s",
                        check.as_str(),
                        self.config.step_timeout_secs
                    ),
                    None,
                )
            }
            Ok(Err(e)) => (
                CheckStatus::Fail,
                format!("{} probe unreachable: {}", check.as_str(), e),
                None,
            ),
            Ok(Ok(result)) => result,
        }
    }

    async fn probe(
        &self,
        check: CheckType,
        health: &DeviceHealth,
    ) -> Result<(CheckStatus, String, Option<(String, String)>)> {
        let device_outcome = |outcome: ProbeOutcome| {
            let code = outcome.error_code.zip(outcome.manufacturer);
            let status = if outcome.ok {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            };
            (status, outcome.detail, code)
        };

        match check {
            CheckType::Connectivity => {
                let outcome = self.adapter.check_connectivity(&health.device_id).await?;
                Ok(device_outcome(outcome))
            }
            CheckType::ProtocolSession => {
                let outcome = self.adapter.check_session(&health.device_id).await?;
                Ok(device_outcome(outcome))
            }
            CheckType::TagRead => {
                let outcome = self
                    .adapter
                    .read_tag(&health.device_id, &health.tag_id)
                    .await?;
                Ok(device_outcome(outcome))
            }
            // The platform-side check reduces the subsystem probe to one
            // result: unhealthy fails, degraded warns.
            CheckType::SystemStatus => {
                let probe = self.adapter.system_probe().await?;
                let overall = SystemHealth::reduce([
                    probe.network,
                    probe.device_integration,
                    probe.data_sync,
                    probe.backend,
                ]);
                let (status, detail) = match overall {
                    ServiceStatus::Unhealthy => (
                        CheckStatus::Fail,
                        format!(
                            "platform status {}: {}",
                            overall.as_str(),
                            probe.performance_notes
                        ),
                    ),
                    ServiceStatus::Degraded => (
                        CheckStatus::Warn,
                        format!("platform status {}", overall.as_str()),
                    ),
                    _ => (
                        CheckStatus::Pass,
                        format!("platform status {}", overall.as_str()),
                    ),
                };
                Ok((status, detail, None))
            }
        }
    }

    async fn conclude(&self, event: &mut DiagnosticEvent) -> Result<()> {
        if event.any_failed() {
            self.diagnose_failure(event).await?;
            event.conclude(DiagnosticStatus::Diagnosed);
        } else {
            let issue = classify(event);
            event.diagnosis = format!(
                "All diagnostic checks passed while signal quality was {}. The degradation \
                 looks like {}; it may be intermittent at the device or its link.",
                event.quality.as_str(),
                issue.pattern()
            );
            event.suggested_actions = vec![
                "Watch the tag over the next few polls".to_string(),
                "If quality keeps degrading, check the device's wireless signal strength"
                    .to_string(),
            ];
            event.conclude(DiagnosticStatus::Inconclusive);
        }
        Ok(())
    }

    async fn diagnose_failure(&self, event: &mut DiagnosticEvent) -> Result<()> {
        let issue = classify(event);

        if let (Some(code), Some(manufacturer)) = (&event.error_code, &event.manufacturer) {
            if let Some(entry) = self.catalog.lookup(code, manufacturer).await? {
                event.diagnosis = entry.plain_english.clone();
                event.suggested_actions = vec![
                    entry.description.clone(),
                    format!("Reference {} code {}", entry.manufacturer, entry.code),
                ];
                event.referral_url = entry.support_url.clone();
                return Ok(());
            }
            // Code surfaced but unknown to the catalog.
            event.diagnosis = format!(
                "{} reported code {} during the {} check. The code is not in the catalog; \
                 contact support with the check log below.",
                manufacturer,
                code,
                failed_step_name(event)
            );
            event.suggested_actions = vec![
                "Share the failed check messages with support".to_string(),
                format!("Ask the manufacturer about code {}", code),
            ];
            return Ok(());
        }

        // No code from the protocol layer; fall back to the classified kind.
        event.diagnosis = format!(
            "Diagnostic found {} on the {} check with no manufacturer code.",
            issue.pattern(),
            failed_step_name(event)
        );
        event.suggested_actions = match issue {
            IssueKind::ConnectivityLoss => vec![
                "Check the device's power and network link".to_string(),
                "Power-cycle the device if it stays unreachable".to_string(),
            ],
            IssueKind::ProtocolFault => vec![
                "Restart the protocol session from the integration page".to_string(),
                "Verify the device firmware matches the configured protocol version".to_string(),
            ],
            IssueKind::TagReadFailure => vec![
                "Confirm the measurement channel still exists on the device".to_string(),
                "Re-map the tag if the device configuration changed".to_string(),
            ],
            _ => vec!["Review the check log and retry the diagnostic".to_string()],
        };
        Ok(())
    }
}

/// Map a concluded sequence to its failure mode. With no failed checks, a
/// degraded quality snapshot reads as intermittent; a clean snapshot means
/// the trigger was staleness.
pub fn classify(event: &DiagnosticEvent) -> IssueKind {
    for check in &event.checks {
        if check.status == CheckStatus::Fail {
            return match check.check {
                CheckType::Connectivity => IssueKind::ConnectivityLoss,
                CheckType::ProtocolSession => IssueKind::ProtocolFault,
                CheckType::TagRead => IssueKind::TagReadFailure,
                CheckType::SystemStatus => IssueKind::Unknown,
            };
        }
    }
    if event.quality == Quality::Good {
        IssueKind::StaleData
    } else {
        IssueKind::Intermittent
    }
}

fn failed_step_name(event: &DiagnosticEvent) -> &str {
    event
        .failed_checks()
        .first()
        .map(|c| c.check.as_str())
        .unwrap_or("diagnostic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckStatus, CheckType};
    use uuid::Uuid;

    fn event_with(checks: &[(CheckType, CheckStatus)], quality: Quality) -> DiagnosticEvent {
        let mut event = DiagnosticEvent::new(
            "vue-1".to_string(),
            "watts".to_string(),
            Uuid::new_v4(),
            quality,
        );
        for (check, status) in checks {
            event.record_check(*check, *status, "test".to_string());
        }
        event
    }

    #[test]
    fn test_classify_first_failure_wins() {
        let event = event_with(
            &[
                (CheckType::Connectivity, CheckStatus::Pass),
                (CheckType::ProtocolSession, CheckStatus::Fail),
                (CheckType::TagRead, CheckStatus::Fail),
                (CheckType::SystemStatus, CheckStatus::Pass),
            ],
            Quality::Bad,
        );
        assert_eq!(classify(&event), IssueKind::ProtocolFault);
    }

    #[test]
    fn test_classify_connectivity() {
        let event = event_with(
            &[(CheckType::Connectivity, CheckStatus::Fail)],
            Quality::Bad,
        );
        assert_eq!(classify(&event), IssueKind::ConnectivityLoss);
    }

    #[test]
    fn test_classify_clean_run_degraded_quality_is_intermittent() {
        let event = event_with(
            &[
                (CheckType::Connectivity, CheckStatus::Pass),
                (CheckType::ProtocolSession, CheckStatus::Pass),
                (CheckType::TagRead, CheckStatus::Pass),
                (CheckType::SystemStatus, CheckStatus::Pass),
            ],
            Quality::Uncertain,
        );
        assert_eq!(classify(&event), IssueKind::Intermittent);
    }

    #[test]
    fn test_classify_clean_run_good_quality_is_stale_data() {
        let event = event_with(
            &[
                (CheckType::Connectivity, CheckStatus::Pass),
                (CheckType::SystemStatus, CheckStatus::Pass),
            ],
            Quality::Good,
        );
        assert_eq!(classify(&event), IssueKind::StaleData);
    }

    #[test]
    fn test_warn_does_not_classify_as_failure() {
        let event = event_with(
            &[
                (CheckType::Connectivity, CheckStatus::Warn),
                (CheckType::ProtocolSession, CheckStatus::Pass),
            ],
            Quality::Bad,
        );
        assert_eq!(classify(&event), IssueKind::Intermittent);
    }
}
