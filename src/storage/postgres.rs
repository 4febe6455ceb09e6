use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::catalog::ErrorCode;
use crate::config::MaintenanceConfig;
use crate::storage::traits::Storage;
use crate::types::{
    DeviceHealth, DiagnosticEvent, DiagnosticFeedback, DiagnosticId, DiagnosticStatus, Impact,
    IssueKind, LearningUpdate, MaintenanceEvent, MaintenanceStatus, Quality,
};

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(include_str!("../../migrations/V001__initial_schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn health_from_row(row: &PgRow) -> Result<DeviceHealth> {
    let quality: String = row.get("quality");
    Ok(DeviceHealth {
        device_id: row.get("device_id"),
        tag_id: row.get("tag_id"),
        user_id: row.get("user_id"),
        quality: Quality::parse(&quality)?,
        last_value: row.get("last_value"),
        last_value_at: row.get("last_value_at"),
        last_checked_at: row.get("last_checked_at"),
    })
}

fn diagnostic_from_row(row: &PgRow) -> Result<DiagnosticEvent> {
    let quality: String = row.get("quality");
    let status: String = row.get("status");
    let progress: i16 = row.get("progress_percent");
    Ok(DiagnosticEvent {
        id: row.get("id"),
        device_id: row.get("device_id"),
        tag_id: row.get("tag_id"),
        user_id: row.get("user_id"),
        quality: Quality::parse(&quality)?,
        checks: serde_json::from_value(row.get("checks"))?,
        error_code: row.get("error_code"),
        manufacturer: row.get("manufacturer"),
        diagnosis: row.get("diagnosis"),
        suggested_actions: serde_json::from_value(row.get("suggested_actions"))?,
        referral_url: row.get("referral_url"),
        status: DiagnosticStatus::parse(&status)?,
        progress_percent: progress as u8,
        started_at: row.get("started_at"),
        concluded_at: row.get("concluded_at"),
    })
}

fn maintenance_from_row(row: &PgRow) -> Result<MaintenanceEvent> {
    let issue: String = row.get("issue");
    let status: String = row.get("status");
    let retry_count: i32 = row.get("retry_count");
    Ok(MaintenanceEvent {
        id: row.get("id"),
        service: row.get("service"),
        device_id: row.get("device_id"),
        tag_id: row.get("tag_id"),
        issue: IssueKind::parse(&issue)?,
        status: MaintenanceStatus::parse(&status)?,
        resolution: row.get("resolution"),
        root_cause: row.get("root_cause"),
        retry_count: retry_count as u32,
        time_to_resolution_secs: row.get("time_to_resolution_secs"),
        timestamp: row.get("timestamp"),
        diagnostic_id: row.get("diagnostic_id"),
        device_model: row.get("device_model"),
    })
}

fn learning_from_row(row: &PgRow) -> Result<LearningUpdate> {
    let impact: String = row.get("impact");
    Ok(LearningUpdate {
        id: row.get("id"),
        issue_pattern: row.get("issue_pattern"),
        optimization_suggestion: row.get("optimization_suggestion"),
        device_correlation: row.get("device_correlation"),
        impact: Impact::parse(&impact)?,
        timestamp: row.get("timestamp"),
    })
}

fn error_code_from_row(row: &PgRow) -> ErrorCode {
    ErrorCode {
        code: row.get("code"),
        manufacturer: row.get("manufacturer"),
        description: row.get("description"),
        plain_english: row.get("plain_english"),
        support_url: row.get("support_url"),
        is_active: row.get("is_active"),
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_health(&self, health: &DeviceHealth) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_health
                (device_id, tag_id, user_id, quality, last_value, last_value_at, last_checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (device_id, tag_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                quality = EXCLUDED.quality,
                last_value = EXCLUDED.last_value,
                last_value_at = EXCLUDED.last_value_at,
                last_checked_at = EXCLUDED.last_checked_at
            "#,
        )
        .bind(&health.device_id)
        .bind(&health.tag_id)
        .bind(health.user_id)
        .bind(health.quality.as_str())
        .bind(&health.last_value)
        .bind(health.last_value_at)
        .bind(health.last_checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_health(&self, device_id: &str, tag_id: &str) -> Result<Option<DeviceHealth>> {
        let row = sqlx::query(
            "SELECT * FROM device_health WHERE device_id = $1 AND tag_id = $2",
        )
        .bind(device_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| health_from_row(&r)).transpose()
    }

    async fn get_device_health(&self, device_id: &str) -> Result<Vec<DeviceHealth>> {
        let rows = sqlx::query("SELECT * FROM device_health WHERE device_id = $1")
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(health_from_row).collect()
    }

    async fn list_health(&self) -> Result<Vec<DeviceHealth>> {
        let rows = sqlx::query("SELECT * FROM device_health")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(health_from_row).collect()
    }

    async fn create_diagnostic(&self, event: &DiagnosticEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO diagnostic_events
                (id, device_id, tag_id, user_id, quality, checks, error_code, manufacturer,
                 diagnosis, suggested_actions, referral_url, status, progress_percent,
                 started_at, concluded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(event.id)
        .bind(&event.device_id)
        .bind(&event.tag_id)
        .bind(event.user_id)
        .bind(event.quality.as_str())
        .bind(serde_json::to_value(&event.checks)?)
        .bind(&event.error_code)
        .bind(&event.manufacturer)
        .bind(&event.diagnosis)
        .bind(serde_json::to_value(&event.suggested_actions)?)
        .bind(&event.referral_url)
        .bind(event.status.as_str())
        .bind(event.progress_percent as i16)
        .bind(event.started_at)
        .bind(event.concluded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_diagnostic(&self, event: &DiagnosticEvent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE diagnostic_events SET
                quality = $2, checks = $3, error_code = $4, manufacturer = $5,
                diagnosis = $6, suggested_actions = $7, referral_url = $8,
                status = $9, progress_percent = $10, concluded_at = $11
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(event.quality.as_str())
        .bind(serde_json::to_value(&event.checks)?)
        .bind(&event.error_code)
        .bind(&event.manufacturer)
        .bind(&event.diagnosis)
        .bind(serde_json::to_value(&event.suggested_actions)?)
        .bind(&event.referral_url)
        .bind(event.status.as_str())
        .bind(event.progress_percent as i16)
        .bind(event.concluded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_diagnostic(&self, id: DiagnosticId) -> Result<Option<DiagnosticEvent>> {
        let row = sqlx::query("SELECT * FROM diagnostic_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| diagnostic_from_row(&r)).transpose()
    }

    async fn get_active_diagnostic(
        &self,
        device_id: &str,
        tag_id: &str,
    ) -> Result<Option<DiagnosticEvent>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM diagnostic_events
            WHERE device_id = $1 AND tag_id = $2 AND status IN ('pending', 'in_progress')
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| diagnostic_from_row(&r)).transpose()
    }

    async fn add_feedback(&self, feedback: &DiagnosticFeedback) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO diagnostic_feedback
                (id, event_id, user_id, was_helpful, comment, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(feedback.id)
        .bind(feedback.event_id)
        .bind(feedback.user_id)
        .bind(feedback.was_helpful)
        .bind(&feedback.comment)
        .bind(feedback.submitted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_feedback(&self, event_id: DiagnosticId) -> Result<Vec<DiagnosticFeedback>> {
        let rows = sqlx::query(
            "SELECT * FROM diagnostic_feedback WHERE event_id = $1 ORDER BY submitted_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| DiagnosticFeedback {
                id: r.get("id"),
                event_id: r.get("event_id"),
                user_id: r.get("user_id"),
                was_helpful: r.get("was_helpful"),
                comment: r.get("comment"),
                submitted_at: r.get("submitted_at"),
            })
            .collect())
    }

    async fn upsert_error_code(&self, entry: &ErrorCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO error_codes
                (code, manufacturer, description, plain_english, support_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code, manufacturer) DO UPDATE SET
                description = EXCLUDED.description,
                plain_english = EXCLUDED.plain_english,
                support_url = EXCLUDED.support_url,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&entry.code)
        .bind(&entry.manufacturer)
        .bind(&entry.description)
        .bind(&entry.plain_english)
        .bind(&entry.support_url)
        .bind(entry.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_error_code(&self, code: &str, manufacturer: &str) -> Result<Option<ErrorCode>> {
        let row = sqlx::query(
            "SELECT * FROM error_codes WHERE code = $1 AND manufacturer = $2",
        )
        .bind(code)
        .bind(manufacturer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| error_code_from_row(&r)))
    }

    async fn list_error_codes(&self) -> Result<Vec<ErrorCode>> {
        let rows = sqlx::query("SELECT * FROM error_codes")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(error_code_from_row).collect())
    }

    async fn append_maintenance_event(&self, event: &MaintenanceEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO maintenance_events
                (id, service, device_id, tag_id, issue, status, resolution, root_cause,
                 retry_count, time_to_resolution_secs, timestamp, diagnostic_id, device_model)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id)
        .bind(&event.service)
        .bind(&event.device_id)
        .bind(&event.tag_id)
        .bind(event.issue.as_str())
        .bind(event.status.as_str())
        .bind(&event.resolution)
        .bind(&event.root_cause)
        .bind(event.retry_count as i32)
        .bind(event.time_to_resolution_secs)
        .bind(event.timestamp)
        .bind(event.diagnostic_id)
        .bind(&event.device_model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn maintenance_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM maintenance_events WHERE timestamp >= $1 ORDER BY timestamp",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(maintenance_from_row).collect()
    }

    async fn append_learning_update(&self, update: &LearningUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO learning_updates
                (id, issue_pattern, optimization_suggestion, device_correlation, impact, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(update.id)
        .bind(&update.issue_pattern)
        .bind(&update.optimization_suggestion)
        .bind(&update.device_correlation)
        .bind(update.impact.as_str())
        .bind(update.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn learning_updates_since(&self, since: DateTime<Utc>) -> Result<Vec<LearningUpdate>> {
        let rows = sqlx::query(
            "SELECT * FROM learning_updates WHERE timestamp >= $1 ORDER BY timestamp",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(learning_from_row).collect()
    }

    async fn get_config(&self) -> Result<MaintenanceConfig> {
        let row = sqlx::query("SELECT * FROM maintenance_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let auto_repair: i32 = r.get("auto_repair_threshold");
                let max_retries: i32 = r.get("max_retries");
                let escalation: i32 = r.get("alert_escalation_threshold");
                Ok(MaintenanceConfig {
                    auto_repair_threshold: auto_repair as u32,
                    max_retries: max_retries as u32,
                    alert_escalation_threshold: escalation as u32,
                    is_active: r.get("is_active"),
                })
            }
            None => Ok(MaintenanceConfig::default()),
        }
    }

    async fn put_config(&self, config: &MaintenanceConfig) -> Result<()> {
        config.validate()?;
        sqlx::query(
            r#"
            INSERT INTO maintenance_config
                (id, auto_repair_threshold, max_retries, alert_escalation_threshold, is_active)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                auto_repair_threshold = EXCLUDED.auto_repair_threshold,
                max_retries = EXCLUDED.max_retries,
                alert_escalation_threshold = EXCLUDED.alert_escalation_threshold,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(config.auto_repair_threshold as i32)
        .bind(config.max_retries as i32)
        .bind(config.alert_escalation_threshold as i32)
        .bind(config.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
