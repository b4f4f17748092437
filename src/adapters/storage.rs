use crate::core::export::SessionDraft;
use crate::domain::ports::SessionStore;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One JSON file per work order under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalDraftStore {
    base_path: String,
}

impl LocalDraftStore {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Bytes outside `[A-Za-z0-9-]`, `_` included, are written as `_XX` so
    /// distinct work ids never share a file.
    pub fn draft_path(&self, work_id: &str) -> PathBuf {
        let mut safe = String::with_capacity(work_id.len());
        for byte in work_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{:02X}", byte));
            }
        }
        Path::new(&self.base_path).join(format!("equipment_draft_{}.json", safe))
    }
}

impl SessionStore for LocalDraftStore {
    async fn load(&self, work_id: &str) -> Result<Option<SessionDraft>> {
        let path = self.draft_path(work_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let draft = serde_json::from_slice(&data)?;
        tracing::debug!("Loaded draft from {}", path.display());
        Ok(Some(draft))
    }

    async fn save(&self, work_id: &str, draft: &SessionDraft) -> Result<()> {
        let path = self.draft_path(work_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(draft)?;
        fs::write(&path, data)?;
        tracing::debug!("Saved draft to {}", path.display());
        Ok(())
    }

    async fn clear(&self, work_id: &str) -> Result<()> {
        let path = self.draft_path(work_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    drafts: Arc<Mutex<HashMap<String, SessionDraft>>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.drafts.lock().await.len()
    }
}

impl SessionStore for MemoryDraftStore {
    async fn load(&self, work_id: &str) -> Result<Option<SessionDraft>> {
        Ok(self.drafts.lock().await.get(work_id).cloned())
    }

    async fn save(&self, work_id: &str, draft: &SessionDraft) -> Result<()> {
        self.drafts
            .lock()
            .await
            .insert(work_id.to_string(), draft.clone());
        Ok(())
    }

    async fn clear(&self, work_id: &str) -> Result<()> {
        self.drafts.lock().await.remove(work_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::ExportBundle;
    use crate::domain::model::SignalStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn draft(work_id: &str) -> SessionDraft {
        SessionDraft {
            work_id: work_id.to_string(),
            bundle: ExportBundle::default(),
            signal_status: SignalStatus::Success,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_local_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = LocalDraftStore::new(dir.path().join("nested").to_string_lossy().to_string());

        assert!(store.load("W1").await.unwrap().is_none());
        store.save("W1", &draft("W1")).await.unwrap();
        assert!(store.draft_path("W1").exists());

        let loaded = store.load("W1").await.unwrap().unwrap();
        assert!(loaded.same_content(&draft("W1")));

        store.clear("W1").await.unwrap();
        assert!(store.load("W1").await.unwrap().is_none());
        store.clear("W1").await.unwrap();
    }

    #[test]
    fn test_work_id_is_escaped_in_file_name() {
        let store = LocalDraftStore::new("/tmp/drafts");
        let path = store.draft_path("../W 1");
        assert!(path.ends_with("equipment_draft__2E_2E_2FW_201.json"));
        assert!(store.draft_path("W-100").ends_with("equipment_draft_W-100.json"));
    }

    #[test]
    fn test_similar_work_ids_get_distinct_files() {
        let store = LocalDraftStore::new("/tmp/drafts");
        assert_ne!(store.draft_path("W/1"), store.draft_path("W_1"));
        assert_ne!(store.draft_path("W 1"), store.draft_path("W_1"));
    }

    #[tokio::test]
    async fn test_memory_store_last_write_wins() {
        let store = MemoryDraftStore::new();
        store.save("W1", &draft("W1")).await.unwrap();
        let mut second = draft("W1");
        second.signal_status = SignalStatus::Fail;
        store.save("W1", &second).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.load("W1").await.unwrap().unwrap().signal_status,
            SignalStatus::Fail
        );
    }
}
