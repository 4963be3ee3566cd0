use crate::error::PersistenceError;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The storage seam the engine saves and restores its state through.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Loads the last saved snapshot. A store that has never been written
    /// returns an empty snapshot.
    async fn load(&self) -> Result<Snapshot, PersistenceError>;

    /// Durably replaces the stored snapshot. A failed save leaves the
    /// previous snapshot intact.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Stores the snapshot as a pretty-printed JSON file.
///
/// Saves write a sibling temporary file, sync it, and rename it over the
/// target, so a crash mid-save never leaves a truncated document behind.
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
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl PersistenceStore for JsonFileStore {
    async fn load(&self) -> Result<Snapshot, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot found; starting with empty state");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            path = %self.path.display(),
            positions = snapshot.positions.len(),
            samples = snapshot.equity_history.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| self.io_error(&temp, e))?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &json)
            .await
            .map_err(|e| self.io_error(&temp, e))?;
        file.sync_all().await.map_err(|e| self.io_error(&temp, e))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "Saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{EquitySample, PositionState};
    use rust_decimal_macros::dec;

    fn populated() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.positions.insert(
            "BTCUSDT".to_string(),
            PositionState::opened(dec!(64250.17), dec!(62322.6649), Some(dec!(68640.00))),
        );
        snapshot.positions.insert(
            "SOLUSDT".to_string(),
            PositionState::opened(dec!(150), dec!(145.5), None),
        );
        snapshot.positions.insert("ETHUSDT".to_string(), PositionState::flat());
        snapshot.equity_history.push(EquitySample {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            total_valuation: dec!(1234.5678),
        });
        snapshot.paper_holdings.insert("BTC".to_string(), dec!(0.0020));
        snapshot.paper_holdings.insert("USDT".to_string(), dec!(-100.00));
        snapshot
    }

    #[tokio::test]
    async fn missing_file_loads_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn saved_snapshot_is_restored_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));
        let snapshot = populated();

        store.save(&snapshot).await.unwrap();
        let restored = store.load().await.unwrap();

        assert_eq!(restored, snapshot);
        assert_eq!(restored.positions["SOLUSDT"].take_profit_price, None);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn reloaded_snapshot_saves_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonFileStore::new(dir.path().join("first.json"));
        let second = JsonFileStore::new(dir.path().join("second.json"));

        first.save(&populated()).await.unwrap();
        second.save(&first.load().await.unwrap()).await.unwrap();

        let original = std::fs::read(first.path()).unwrap();
        let resaved = std::fs::read(second.path()).unwrap();
        assert_eq!(original, resaved);
        // Scale survives the round trip.
        let text = String::from_utf8(original).unwrap();
        assert!(text.contains("\"68640.00\""));
        assert!(text.contains("\"0.0020\""));
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        store.save(&populated()).await.unwrap();
        store.save(&Snapshot::default()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::new(&path).load().await;
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }
}
