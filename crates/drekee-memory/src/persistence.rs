use std::path::{Path, PathBuf};

use async_trait::async_trait;
use drekee_protocol::{ChatError, ChatResult, MemorySnapshot, PersistencePort};
use parking_lot::Mutex;
use tokio::fs;
use tracing::warn;

pub const MEMORY_FILE_NAME: &str = "drekee_memory.json";

/// Decode a stored slot. Unparseable data reads as an empty slot.
pub fn decode_snapshot(raw: &str, origin: &str) -> Option<MemorySnapshot> {
    match serde_json::from_str::<MemorySnapshot>(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            warn!(%origin, %error, "discarding malformed memory snapshot");
            None
        }
    }
}

/// Memory slot backed by one JSON document under a data root.
#[derive(Debug, Clone)]
pub struct FileMemoryPersistence {
    path: PathBuf,
}

impl FileMemoryPersistence {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(MEMORY_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(action: &str, path: &Path, error: std::io::Error) -> ChatError {
    ChatError::Persistence(format!("failed {action} {}: {error}", path.display()))
}

#[async_trait]
impl PersistencePort for FileMemoryPersistence {
    async fn load(&self) -> ChatResult<Option<MemorySnapshot>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|error| io_error("reading memory file", &self.path, error))?;
        Ok(decode_snapshot(&raw, &self.path.display().to_string()))
    }

    async fn save(&self, snapshot: &MemorySnapshot) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|error| io_error("creating memory dir", parent, error))?;
        }

        let payload = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, payload)
            .await
            .map_err(|error| io_error("writing memory file", &self.path, error))
    }

    async fn clear(&self) -> ChatResult<()> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        fs::remove_file(&self.path)
            .await
            .map_err(|error| io_error("removing memory file", &self.path, error))
    }
}

/// Memory slot holding the raw JSON text in process, like a browser
/// key-value slot.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    slot: Mutex<Option<String>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with arbitrary stored text, parseable or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn load(&self) -> ChatResult<Option<MemorySnapshot>> {
        let raw = self.slot.lock().clone();
        Ok(raw.and_then(|raw| decode_snapshot(&raw, "in-memory slot")))
    }

    async fn save(&self, snapshot: &MemorySnapshot) -> ChatResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        *self.slot.lock() = Some(payload);
        Ok(())
    }

    async fn clear(&self) -> ChatResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBank;
    use drekee_protocol::Role;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("drekee-memory-{name}-{nanos}"))
    }

    fn sample_snapshot() -> MemorySnapshot {
        let mut bank = MemoryBank::default();
        bank.add_turn_at(Role::User, "como criar um parser", 1_000);
        bank.update_preference("complexity", "simple");
        bank.add_project_at("calc", "def soma(a, b)", "python", "soma", 1_000);
        bank.snapshot()
    }

    #[tokio::test]
    async fn file_slot_round_trips_and_is_idempotent() -> anyhow::Result<()> {
        let root = unique_test_root("roundtrip");
        let port = FileMemoryPersistence::new(&root);
        assert!(port.load().await?.is_none());

        let snapshot = sample_snapshot();
        port.save(&snapshot).await?;
        let first_raw = fs::read_to_string(port.path()).await?;

        let loaded = port.load().await?.unwrap_or_default();
        assert_eq!(loaded, snapshot);
        port.save(&loaded).await?;
        assert_eq!(fs::read_to_string(port.path()).await?, first_raw);

        port.clear().await?;
        assert!(port.load().await?.is_none());

        fs::remove_dir_all(&root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_reads_as_empty() -> anyhow::Result<()> {
        let root = unique_test_root("corrupted");
        fs::create_dir_all(&root).await?;
        let port = FileMemoryPersistence::new(&root);
        fs::write(port.path(), "{ not json").await?;

        assert!(port.load().await?.is_none());

        fs::remove_dir_all(&root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn in_memory_slot_matches_stored_shape() -> anyhow::Result<()> {
        let port = InMemoryPersistence::new();
        port.save(&sample_snapshot()).await?;

        let raw: serde_json::Value = serde_json::from_str(&port.raw().unwrap_or_default())?;
        assert_eq!(raw["userMemory"]["preferences"]["complexity"], "simple");
        assert_eq!(raw["projectMemory"]["python"][0]["name"], "calc");
        assert_eq!(raw["conversationMemory"][0]["context"], "help");

        let broken = InMemoryPersistence::with_raw("[1,2");
        assert!(broken.load().await?.is_none());
        Ok(())
    }
}
