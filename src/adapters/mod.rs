use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{IssueKind, ServiceStatus};

/// Outcome of one adapter probe or repair action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub detail: String,
    /// Manufacturer fault code surfaced by the protocol layer, when one is.
    pub error_code: Option<String>,
    pub manufacturer: Option<String>,
}

impl ProbeOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
            error_code: None,
            manufacturer: None,
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
            error_code: None,
            manufacturer: None,
        }
    }

    pub fn fail_with_code(
        detail: impl Into<String>,
        code: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
            error_code: Some(code.into()),
            manufacturer: Some(manufacturer.into()),
        }
    }
}

/// Per-subsystem snapshot from the platform probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemProbe {
    pub network: ServiceStatus,
    pub device_integration: ServiceStatus,
    pub data_sync: ServiceStatus,
    pub backend: ServiceStatus,
    pub uptime_percent: f64,
    pub active_processes: Vec<String>,
    pub performance_notes: String,
}

/// Seam to the device/protocol integration layer.
///
/// Implementations live with the embedding service. Calls are expected to
/// return promptly; the sequencer wraps every call in a timeout and treats
/// a hang or an `Err` as a failed check, so implementations should report
/// device trouble through `ProbeOutcome` rather than errors.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    async fn check_connectivity(&self, device_id: &str) -> Result<ProbeOutcome>;

    async fn check_session(&self, device_id: &str) -> Result<ProbeOutcome>;

    async fn read_tag(&self, device_id: &str, tag_id: &str) -> Result<ProbeOutcome>;

    async fn system_probe(&self) -> Result<SystemProbe>;

    /// Issue-specific repair action (reconnect, session restart, re-poll).
    async fn attempt_repair(&self, device_id: &str, issue: IssueKind) -> Result<ProbeOutcome>;

    /// Brand/model label for a device, when the registry knows it. Feeds
    /// the learning loop's device correlation.
    async fn device_model(&self, device_id: &str) -> Result<Option<String>>;
}
