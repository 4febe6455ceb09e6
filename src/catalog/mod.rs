pub mod builtin;

pub use builtin::builtin_error_codes;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::Storage;

/// Manufacturer error-code reference entry, keyed by (code, manufacturer).
/// Admin-maintained; the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: String,
    pub manufacturer: String,
    pub description: String,
    pub plain_english: String,
    pub support_url: Option<String>,
    pub is_active: bool,
}

/// Lookup service over the error-code table. The diagnostic sequencer is
/// its only in-pipeline consumer.
pub struct ErrorCodeCatalog {
    storage: Arc<dyn Storage>,
}

impl ErrorCodeCatalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Install the built-in code set. Existing entries win, so admin edits
    /// survive re-seeding.
    pub async fn seed_builtin(&self) -> Result<()> {
        for entry in builtin_error_codes() {
            if self
                .storage
                .get_error_code(&entry.code, &entry.manufacturer)
                .await?
                .is_none()
            {
                self.storage.upsert_error_code(&entry).await?;
            }
        }
        Ok(())
    }

    /// Exact match. Inactive entries are still returned here so historical
    /// diagnoses stay explainable.
    pub async fn lookup(&self, code: &str, manufacturer: &str) -> Result<Option<ErrorCode>> {
        self.storage.get_error_code(code, manufacturer).await
    }

    /// Fuzzy match on code or description for the "likely codes" surface.
    /// Inactive entries never appear here.
    pub async fn suggest(&self, fragment: &str) -> Result<Vec<ErrorCode>> {
        let needle = fragment.to_lowercase();
        let mut matches: Vec<ErrorCode> = self
            .storage
            .list_error_codes()
            .await?
            .into_iter()
            .filter(|e| e.is_active)
            .filter(|e| {
                e.code.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .collect();
        matches.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    async fn seeded_catalog() -> ErrorCodeCatalog {
        let storage = Arc::new(InMemoryStorage::new());
        let catalog = ErrorCodeCatalog::new(storage);
        catalog.seed_builtin().await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_exact_lookup() {
        let catalog = seeded_catalog().await;

        let hit = catalog.lookup("S7-001", "Siemens").await.unwrap();
        assert!(hit.is_some());
        assert!(hit.unwrap().plain_english.contains("refused"));

        let miss = catalog.lookup("S7-001", "Modbus").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_inactive_entry_returned_on_exact_match() {
        let catalog = seeded_catalog().await;

        let hit = catalog.lookup("EV-200", "Emporia").await.unwrap();
        assert!(hit.is_some());
        assert!(!hit.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_suggest_excludes_inactive() {
        let catalog = seeded_catalog().await;

        let matches = catalog.suggest("reporting gap").await.unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|e| e.is_active));
        assert!(matches.iter().any(|e| e.code == "EV-210"));
        assert!(!matches.iter().any(|e| e.code == "EV-200"));
    }

    #[tokio::test]
    async fn test_seed_does_not_clobber_admin_edits() {
        let storage = Arc::new(InMemoryStorage::new());
        let catalog = ErrorCodeCatalog::new(storage.clone());
        catalog.seed_builtin().await.unwrap();

        let mut edited = catalog.lookup("MB-02", "Modbus").await.unwrap().unwrap();
        edited.plain_english = "Site-specific register map note.".to_string();
        storage.upsert_error_code(&edited).await.unwrap();

        catalog.seed_builtin().await.unwrap();
        let after = catalog.lookup("MB-02", "Modbus").await.unwrap().unwrap();
        assert_eq!(after.plain_english, "Site-specific register map note.");
    }
}
