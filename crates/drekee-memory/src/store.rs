use std::sync::Arc;

use drekee_protocol::{
    ChatResult, ConversationTurn, MemorySnapshot, MemoryStats, PersistencePort, PreferenceValue,
    Role, ScoredProject, ScoredTurn, now_millis,
};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::bank::MemoryBank;

/// Memory service: a [`MemoryBank`] plus the slot it persists to.
///
/// Every mutation is applied in memory first, then persisted. A persistence
/// failure is returned to the caller but the in-memory change stands, so the
/// caller can log it and carry on.
///
/// Slot writes are serialized by `write_lock`: snapshot-and-save and
/// clear-bank-and-slot each run under it.
#[derive(Clone)]
pub struct MemoryStore {
    bank: Arc<Mutex<MemoryBank>>,
    persistence: Arc<dyn PersistencePort>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryStore {
    /// Empty store bound to `persistence`, without reading it.
    pub fn new(persistence: Arc<dyn PersistencePort>) -> Self {
        Self {
            bank: Arc::new(Mutex::new(MemoryBank::default())),
            persistence,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Store initialised from the slot. Missing, malformed or unreadable
    /// state starts empty.
    #[instrument(skip(persistence))]
    pub async fn load(persistence: Arc<dyn PersistencePort>) -> Self {
        let snapshot = match persistence.load().await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(error) => {
                warn!(%error, "memory slot unreadable, starting empty");
                MemorySnapshot::default()
            }
        };

        debug!(
            turns = snapshot.conversation_memory.len(),
            languages = snapshot.project_memory.len(),
            "memory loaded"
        );

        Self {
            bank: Arc::new(Mutex::new(MemoryBank::from_snapshot(snapshot))),
            persistence,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    async fn persist(&self) -> ChatResult<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.bank.lock().snapshot();
        self.persistence.save(&snapshot).await
    }

    #[instrument(skip_all, fields(role = %role, chars = content.chars().count()))]
    pub async fn add_turn(&self, role: Role, content: &str) -> ChatResult<()> {
        self.add_turn_at(role, content, now_millis()).await
    }

    pub async fn add_turn_at(&self, role: Role, content: &str, timestamp: i64) -> ChatResult<()> {
        self.bank.lock().add_turn_at(role, content, timestamp);
        self.persist().await
    }

    pub fn relevant_context(&self, query: &str) -> Vec<ScoredTurn> {
        self.relevant_context_at(query, now_millis())
    }

    pub fn relevant_context_at(&self, query: &str, now: i64) -> Vec<ScoredTurn> {
        self.bank.lock().relevant_context_at(query, now)
    }

    pub async fn update_preference(
        &self,
        key: impl Into<String>,
        value: impl Into<PreferenceValue>,
    ) -> ChatResult<()> {
        self.bank.lock().update_preference(key, value);
        self.persist().await
    }

    pub fn preference(&self, key: &str) -> Option<PreferenceValue> {
        self.bank.lock().preference(key).cloned()
    }

    #[instrument(skip_all)]
    pub async fn learn_from_interaction(
        &self,
        user_message: &str,
        ai_response: &str,
        feedback: Option<&str>,
    ) -> ChatResult<()> {
        let learned = self.bank.lock().learn_from_interaction_at(
            user_message,
            ai_response,
            feedback,
            now_millis(),
        );
        if !learned {
            return Ok(());
        }
        debug!("user preferences updated");
        self.persist().await
    }

    #[instrument(skip_all, fields(language = %language))]
    pub async fn add_project(
        &self,
        name: &str,
        code: &str,
        language: &str,
        description: &str,
    ) -> ChatResult<()> {
        self.bank
            .lock()
            .add_project_at(name, code, language, description, now_millis());
        self.persist().await
    }

    pub fn similar_code(&self, snippet: &str, language: &str) -> Vec<ScoredProject> {
        self.bank.lock().similar_code(snippet, language)
    }

    pub fn stats(&self) -> MemoryStats {
        self.bank.lock().stats()
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.bank.lock().turns().to_vec()
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.bank.lock().snapshot()
    }

    #[instrument(skip(self))]
    pub async fn clear(&self) -> ChatResult<()> {
        let _guard = self.write_lock.lock().await;
        self.bank.lock().clear();
        self.persistence.clear().await
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use async_trait::async_trait;
    use drekee_protocol::ChatError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    struct BrokenSlot;

    /// Holds the first `save` until `release` is notified.
    struct GatedSlot {
        inner: Arc<InMemoryPersistence>,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedSlot {
        fn new(inner: Arc<InMemoryPersistence>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl PersistencePort for GatedSlot {
        async fn load(&self) -> ChatResult<Option<MemorySnapshot>> {
            self.inner.load().await
        }

        async fn save(&self, snapshot: &MemorySnapshot) -> ChatResult<()> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.save(snapshot).await
        }

        async fn clear(&self) -> ChatResult<()> {
            self.inner.clear().await
        }
    }

    #[async_trait]
    impl PersistencePort for BrokenSlot {
        async fn load(&self) -> ChatResult<Option<MemorySnapshot>> {
            Err(ChatError::Persistence("disk on fire".to_owned()))
        }

        async fn save(&self, _snapshot: &MemorySnapshot) -> ChatResult<()> {
            Err(ChatError::Persistence("disk on fire".to_owned()))
        }

        async fn clear(&self) -> ChatResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn mutations_are_persisted_and_reloaded() -> anyhow::Result<()> {
        let slot = Arc::new(InMemoryPersistence::new());
        let store = MemoryStore::load(slot.clone()).await;

        store.add_turn(Role::User, "como criar uma api em rust").await?;
        store.update_preference("theme", "dark").await?;
        store
            .add_project("api", "fn main() {}", "rust", "servidor http")
            .await?;

        let reloaded = MemoryStore::load(slot).await;
        assert_eq!(reloaded.snapshot(), store.snapshot());
        assert_eq!(reloaded.stats().turn_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_slot_loads_like_empty_slot() -> anyhow::Result<()> {
        let corrupted = MemoryStore::load(Arc::new(InMemoryPersistence::with_raw("{oops"))).await;
        let empty = MemoryStore::load(Arc::new(InMemoryPersistence::new())).await;

        assert_eq!(corrupted.snapshot(), empty.snapshot());
        assert_eq!(corrupted.stats(), MemoryStats::default());
        Ok(())
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_change() {
        let store = MemoryStore::load(Arc::new(BrokenSlot)).await;

        let result = store.add_turn(Role::Assistant, "resposta").await;
        assert!(matches!(result, Err(ChatError::Persistence(_))));
        assert_eq!(store.stats().turn_count, 1);
    }

    #[tokio::test]
    async fn learning_without_triggers_skips_persistence() -> anyhow::Result<()> {
        let slot = Arc::new(InMemoryPersistence::new());
        let store = MemoryStore::new(slot.clone());

        store.learn_from_interaction("bom dia", "oi", None).await?;
        assert!(slot.raw().is_none());

        store.learn_from_interaction("em python", "ok", None).await?;
        assert!(slot.raw().is_some());
        assert_eq!(
            store.preference("preferredLanguage"),
            Some(PreferenceValue::from("python"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn clear_empties_state_and_slot() -> anyhow::Result<()> {
        let slot = Arc::new(InMemoryPersistence::new());
        let store = MemoryStore::new(slot.clone());
        store.add_turn(Role::User, "olá").await?;

        store.clear().await?;
        assert_eq!(store.stats(), MemoryStats::default());
        assert!(slot.raw().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn clear_is_not_undone_by_a_save_in_flight() -> anyhow::Result<()> {
        let inner = Arc::new(InMemoryPersistence::new());
        let slot = GatedSlot::new(inner.clone());
        let store = MemoryStore::new(slot.clone());

        let adding = tokio::spawn({
            let store = store.clone();
            async move { store.add_turn(Role::User, "como criar uma api").await }
        });
        slot.entered.notified().await;

        let clearing = tokio::spawn({
            let store = store.clone();
            async move { store.clear().await }
        });
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        slot.release.notify_one();

        adding.await??;
        clearing.await??;

        assert_eq!(store.stats(), MemoryStats::default());
        assert!(inner.raw().is_none());
        let reloaded = MemoryStore::load(inner).await;
        assert_eq!(reloaded.stats().turn_count, 0);
        Ok(())
    }
}
