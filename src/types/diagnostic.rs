use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    CheckStatus, CheckType, DeviceId, DiagnosticId, DiagnosticStatus, FeedbackId, Quality, TagId,
    UserId,
};

/// One step of a diagnostic sequence. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckType,
    pub status: CheckStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One diagnostic incident for a (device, tag) pair.
///
/// Progress tracks sequence completion, not success: each completed step
/// adds a fixed increment whether it passed or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub id: DiagnosticId,
    pub device_id: DeviceId,
    pub tag_id: TagId,
    pub user_id: UserId,
    pub quality: Quality,
    pub checks: Vec<CheckResult>,
    pub error_code: Option<String>,
    pub manufacturer: Option<String>,
    pub diagnosis: String,
    pub suggested_actions: Vec<String>,
    pub referral_url: Option<String>,
    pub status: DiagnosticStatus,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub concluded_at: Option<DateTime<Utc>>,
}

impl DiagnosticEvent {
    pub const STEP_INCREMENT: u8 = 25;

    pub fn new(device_id: DeviceId, tag_id: TagId, user_id: UserId, quality: Quality) -> Self {
        Self {
            id: DiagnosticId::new_v4(),
            device_id,
            tag_id,
            user_id,
            quality,
            checks: Vec::new(),
            error_code: None,
            manufacturer: None,
            diagnosis: String::new(),
            suggested_actions: Vec::new(),
            referral_url: None,
            status: DiagnosticStatus::Pending,
            progress_percent: 0,
            started_at: Utc::now(),
            concluded_at: None,
        }
    }

    /// Append a step result and advance progress. Progress saturates at 100
    /// so it stays monotone even if a caller records an extra step.
    pub fn record_check(&mut self, check: CheckType, status: CheckStatus, message: String) {
        self.checks.push(CheckResult {
            check,
            status,
            message,
            timestamp: Utc::now(),
        });
        self.progress_percent = self
            .progress_percent
            .saturating_add(Self::STEP_INCREMENT)
            .min(100);
    }

    pub fn any_failed(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn conclude(&mut self, status: DiagnosticStatus) {
        self.status = status;
        self.concluded_at = Some(Utc::now());
    }

    /// Seconds from incident start to conclusion, or elapsed so far when the
    /// sequence is still running.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.concluded_at.unwrap_or(now);
        end.signed_duration_since(self.started_at).num_seconds()
    }
}

/// User judgment on a concluded diagnostic. Append-only; repeat submissions
/// by the same user are all kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticFeedback {
    pub id: FeedbackId,
    pub event_id: DiagnosticId,
    pub user_id: UserId,
    pub was_helpful: bool,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl DiagnosticFeedback {
    pub fn new(
        event_id: DiagnosticId,
        user_id: UserId,
        was_helpful: bool,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: FeedbackId::new_v4(),
            event_id,
            user_id,
            was_helpful,
            comment,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn event() -> DiagnosticEvent {
        DiagnosticEvent::new(
            "vue-1021".to_string(),
            "channel_3_watts".to_string(),
            Uuid::new_v4(),
            Quality::Bad,
        )
    }

    #[test]
    fn test_new_event_starts_pending() {
        let e = event();
        assert_eq!(e.status, DiagnosticStatus::Pending);
        assert_eq!(e.progress_percent, 0);
        assert!(e.checks.is_empty());
        assert!(e.concluded_at.is_none());
    }

    #[test]
    fn test_progress_advances_per_step_regardless_of_outcome() {
        let mut e = event();
        e.record_check(CheckType::Connectivity, CheckStatus::Pass, "ok".into());
        assert_eq!(e.progress_percent, 25);
        e.record_check(CheckType::ProtocolSession, CheckStatus::Fail, "no session".into());
        assert_eq!(e.progress_percent, 50);
        e.record_check(CheckType::TagRead, CheckStatus::Warn, "slow read".into());
        assert_eq!(e.progress_percent, 75);
        e.record_check(CheckType::SystemStatus, CheckStatus::Pass, "ok".into());
        assert_eq!(e.progress_percent, 100);
    }

    #[test]
    fn test_progress_saturates() {
        let mut e = event();
        for _ in 0..6 {
            e.record_check(CheckType::Connectivity, CheckStatus::Pass, "ok".into());
        }
        assert_eq!(e.progress_percent, 100);
    }

    #[test]
    fn test_failed_checks() {
        let mut e = event();
        e.record_check(CheckType::Connectivity, CheckStatus::Pass, "ok".into());
        e.record_check(CheckType::ProtocolSession, CheckStatus::Fail, "refused".into());
        assert!(e.any_failed());
        assert_eq!(e.failed_checks().len(), 1);
        assert_eq!(e.failed_checks()[0].check, CheckType::ProtocolSession);
    }

    #[test]
    fn test_conclude_sets_terminal() {
        let mut e = event();
        e.conclude(DiagnosticStatus::Diagnosed);
        assert!(e.is_terminal());
        assert!(e.concluded_at.is_some());
    }
}
