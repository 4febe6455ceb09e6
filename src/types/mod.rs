pub mod diagnostic;
pub mod health;
pub mod maintenance;

pub use diagnostic::{CheckResult, DiagnosticEvent, DiagnosticFeedback};
pub use health::DeviceHealth;
pub use maintenance::{
    LearningUpdate, MaintenanceDashboard, MaintenanceEvent, SystemHealth,
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DeviceId = String;
pub type TagId = String;
pub type UserId = Uuid;
pub type DiagnosticId = Uuid;
pub type MaintenanceId = Uuid;
pub type FeedbackId = Uuid;
pub type LearningId = Uuid;

/// Signal quality reported by the upstream protocol adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
}

impl Quality {
    pub fn as_str(&self) -> &str {
        match self {
            Quality::Good => "good",
            Quality::Bad => "bad",
            Quality::Uncertain => "uncertain",
        }
    }

    /// Adapters hand quality over as text; anything outside the closed set
    /// is rejected before it can touch a health record.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "good" => Ok(Quality::Good),
            "bad" => Ok(Quality::Bad),
            "uncertain" => Ok(Quality::Uncertain),
            other => Err(anyhow!("unknown quality value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckType {
    Connectivity,
    ProtocolSession,
    TagRead,
    SystemStatus,
}

impl CheckType {
    /// Fixed diagnostic order. Later checks are interpreted in light of
    /// earlier ones, so this sequence never reorders.
    pub const SEQUENCE: [CheckType; 4] = [
        CheckType::Connectivity,
        CheckType::ProtocolSession,
        CheckType::TagRead,
        CheckType::SystemStatus,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            CheckType::Connectivity => "connectivity",
            CheckType::ProtocolSession => "protocol_session",
            CheckType::TagRead => "tag_read",
            CheckType::SystemStatus => "system_status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

impl CheckStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Warn => "warn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticStatus {
    Pending,
    InProgress,
    Diagnosed,
    Inconclusive,
}

impl DiagnosticStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiagnosticStatus::Diagnosed | DiagnosticStatus::Inconclusive
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            DiagnosticStatus::Pending => "pending",
            DiagnosticStatus::InProgress => "in_progress",
            DiagnosticStatus::Diagnosed => "diagnosed",
            DiagnosticStatus::Inconclusive => "inconclusive",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DiagnosticStatus::Pending),
            "in_progress" => Ok(DiagnosticStatus::InProgress),
            "diagnosed" => Ok(DiagnosticStatus::Diagnosed),
            "inconclusive" => Ok(DiagnosticStatus::Inconclusive),
            other => Err(anyhow!("unknown diagnostic status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    InProgress,
    Resolved,
    Escalated,
}

impl MaintenanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MaintenanceStatus::Resolved | MaintenanceStatus::Escalated
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            MaintenanceStatus::InProgress => "in_progress",
            MaintenanceStatus::Resolved => "resolved",
            MaintenanceStatus::Escalated => "escalated",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "in_progress" => Ok(MaintenanceStatus::InProgress),
            "resolved" => Ok(MaintenanceStatus::Resolved),
            "escalated" => Ok(MaintenanceStatus::Escalated),
            other => Err(anyhow!("unknown maintenance status: {}", other)),
        }
    }
}

/// Classified failure mode of a concluded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    ConnectivityLoss,
    ProtocolFault,
    TagReadFailure,
    StaleData,
    Intermittent,
    Unknown,
}

impl IssueKind {
    pub fn as_str(&self) -> &str {
        match self {
            IssueKind::ConnectivityLoss => "connectivity_loss",
            IssueKind::ProtocolFault => "protocol_fault",
            IssueKind::TagReadFailure => "tag_read_failure",
            IssueKind::StaleData => "stale_data",
            IssueKind::Intermittent => "intermittent",
            IssueKind::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "connectivity_loss" => Ok(IssueKind::ConnectivityLoss),
            "protocol_fault" => Ok(IssueKind::ProtocolFault),
            "tag_read_failure" => Ok(IssueKind::TagReadFailure),
            "stale_data" => Ok(IssueKind::StaleData),
            "intermittent" => Ok(IssueKind::Intermittent),
            "unknown" => Ok(IssueKind::Unknown),
            other => Err(anyhow!("unknown issue kind: {}", other)),
        }
    }

    /// Pattern label the learning loop aggregates on.
    pub fn pattern(&self) -> &str {
        match self {
            IssueKind::ConnectivityLoss => "device unreachable",
            IssueKind::ProtocolFault => "protocol session failure",
            IssueKind::TagReadFailure => "tag read failure",
            IssueKind::StaleData => "stale telemetry",
            IssueKind::Intermittent => "intermittent signal degradation",
            IssueKind::Unknown => "unclassified degradation",
        }
    }

    /// Only issue kinds with an adapter-supported repair action qualify
    /// for the auto-repair path.
    pub fn auto_repairable(&self) -> bool {
        matches!(
            self,
            IssueKind::ConnectivityLoss | IssueKind::ProtocolFault | IssueKind::StaleData
        )
    }
}

/// Subsystem status, ordered by severity: Unhealthy > Degraded > Healthy.
/// Unknown carries no severity and is skipped when reducing to an overall
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl ServiceStatus {
    pub fn severity(&self) -> u8 {
        match self {
            ServiceStatus::Unknown => 0,
            ServiceStatus::Healthy => 1,
            ServiceStatus::Degraded => 2,
            ServiceStatus::Unhealthy => 3,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "unknown" => Ok(ServiceStatus::Unknown),
            "healthy" => Ok(ServiceStatus::Healthy),
            "degraded" => Ok(ServiceStatus::Degraded),
            "unhealthy" => Ok(ServiceStatus::Unhealthy),
            other => Err(anyhow!("unknown service status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(anyhow!("unknown impact: {}", other)),
        }
    }
}
