use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Offer;
use crate::traits::ObservedStore;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    offers: Vec<Offer>,
}

/// Observed state persisted as a pretty-printed JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "observed.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ObservedStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Offer>, AppError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot yet, starting empty");
                return Ok(vec![]);
            }
            Err(e) => {
                return Err(AppError::StorageError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&raw).map_err(|e| {
            AppError::StorageError(format!("Corrupt snapshot {}: {e}", self.path.display()))
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::StorageError(format!(
                "Unsupported snapshot version {} in {}",
                snapshot.version,
                self.path.display()
            )));
        }
        Ok(snapshot.offers)
    }

    async fn save(&self, offers: &[Offer]) -> Result<(), AppError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            offers: offers.to_vec(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::StorageError(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::StorageError(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), offers = offers.len(), "Snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(title: &str, price: &str) -> Offer {
        Offer {
            source_name: "Hotel1".into(),
            title: title.into(),
            price: Some(price.into()),
            description: None,
            source_location: "https://hotel1.example/".into(),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("observed.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saved_offers_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("observed.json"));

        store
            .save(&[offer("Summer Deal", "$100"), offer("Winter Deal", "$90")])
            .await
            .unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "Summer Deal");
        assert_eq!(loaded[1].price.as_deref(), Some("$90"));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("observed.json"));

        store.save(&[offer("Old", "$1")]).await.unwrap();
        store.save(&[offer("New", "$2")]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "New");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observed.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AppError::StorageError(_)));
    }
}
