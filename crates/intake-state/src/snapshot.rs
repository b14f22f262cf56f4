//! # Client Snapshots
//!
//! The durable, session-local copy of a wizard's progress. It survives
//! process restarts for the same session but is never shared across
//! sessions.
//!
//! Storage is a small key-value namespace with four fixed keys:
//!
//! | Key                         | Value                          |
//! |-----------------------------|--------------------------------|
//! | [`FORM_DATA_KEY`]           | form fields + navigation state |
//! | [`APPLICATION_ID_KEY`]      | persisted application id       |
//! | [`SUBMISSION_SUCCESS_KEY`]  | `true` after final submission  |
//! | [`USER_ID_KEY`]             | upserted applicant user id     |
//!
//! [`ClientSnapshot`] is the typed view over those keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use intake_core::{ApplicationId, Timestamp, UserId};

use crate::store::ApplicationFormState;

/// Key holding the serialized [`ApplicationFormState`].
pub const FORM_DATA_KEY: &str = "loanApplicationFormData";
/// Key holding the persisted application id.
pub const APPLICATION_ID_KEY: &str = "loanApplicationId";
/// Key holding the submission-success flag.
pub const SUBMISSION_SUCCESS_KEY: &str = "loanApplicationSubmitted";
/// Key holding the applicant's user id.
pub const USER_ID_KEY: &str = "loanApplicationUserId";

const ALL_KEYS: [&str; 4] = [
    FORM_DATA_KEY,
    APPLICATION_ID_KEY,
    SUBMISSION_SUCCESS_KEY,
    USER_ID_KEY,
];

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from snapshot storage.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A stored value did not match its expected shape.
    #[error("snapshot key {key} is corrupt: {source}")]
    Corrupt {
        /// The storage key.
        key: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

// ─── Storage seam ────────────────────────────────────────────────────

/// Key-value storage for one session's snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read a key. `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, SnapshotError>;

    /// Write a key, replacing any previous value.
    async fn put(&self, key: &str, value: &Value) -> Result<(), SnapshotError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), SnapshotError>;
}

/// In-process snapshot storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, SnapshotError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &Value) -> Result<(), SnapshotError> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key under a session directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write leaves the previous value intact. All file access goes
/// through `tokio::fs`, off the async worker threads.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) the snapshot directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SnapshotError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, SnapshotError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn put(&self, key: &str, value: &Value) -> Result<(), SnapshotError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        let io = |source| SnapshotError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&tmp).await.map_err(io)?;
        file.write_all(&bytes).await.map_err(io)?;
        file.sync_all().await.map_err(io)?;
        drop(file);
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| SnapshotError::Io { path, source })
    }

    async fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }
}

// ─── Typed view ──────────────────────────────────────────────────────

/// Everything a session keeps client-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    /// In-progress form; `None` after reset or successful submission.
    pub form: Option<ApplicationFormState>,
    /// Id of the persisted application record, once created.
    pub application_id: Option<ApplicationId>,
    /// Whether the final submission succeeded.
    pub submission_succeeded: bool,
    /// Id of the upserted applicant.
    pub user_id: Option<UserId>,
    /// When the form key was last written.
    pub saved_at: Option<Timestamp>,
}

/// Envelope stored under [`FORM_DATA_KEY`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormEnvelope {
    state: ApplicationFormState,
    saved_at: Timestamp,
}

impl ClientSnapshot {
    /// Read all keys from `store`.
    pub async fn load(store: &dyn SnapshotStore) -> Result<Self, SnapshotError> {
        let envelope: Option<FormEnvelope> = read_key(store, FORM_DATA_KEY).await?;
        let (form, saved_at) = match envelope {
            Some(e) => (Some(e.state), Some(e.saved_at)),
            None => (None, None),
        };
        Ok(Self {
            form,
            saved_at,
            application_id: read_key(store, APPLICATION_ID_KEY).await?,
            submission_succeeded: read_key(store, SUBMISSION_SUCCESS_KEY)
                .await?
                .unwrap_or(false),
            user_id: read_key(store, USER_ID_KEY).await?,
        })
    }

    /// Whether nothing has been stored for this session.
    pub fn is_blank(&self) -> bool {
        self.form.is_none()
            && self.application_id.is_none()
            && self.user_id.is_none()
            && !self.submission_succeeded
    }
}

/// Write the form key.
pub(crate) async fn save_form(
    store: &dyn SnapshotStore,
    state: &ApplicationFormState,
) -> Result<(), SnapshotError> {
    let envelope = FormEnvelope {
        state: state.clone(),
        saved_at: Timestamp::now(),
    };
    write_key(store, FORM_DATA_KEY, &envelope).await
}

/// Write a typed value under `key`.
pub(crate) async fn write_key<T: Serialize>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<(), SnapshotError> {
    let value = serde_json::to_value(value).map_err(|source| SnapshotError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.put(key, &value).await
}

/// Remove every snapshot key.
pub(crate) async fn clear_all(store: &dyn SnapshotStore) -> Result<(), SnapshotError> {
    for key in ALL_KEYS {
        store.remove(key).await?;
    }
    Ok(())
}

async fn read_key<T: for<'de> Deserialize<'de>>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, SnapshotError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StepRegistry;

    #[tokio::test]
    async fn memory_store_put_get_remove() {
        let store = MemorySnapshotStore::new();
        store.put("k", &serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!({"a": 1})));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("session")).await.unwrap();
        store.put(USER_ID_KEY, &serde_json::json!("abc")).await.unwrap();

        let reopened = FileSnapshotStore::open(dir.path().join("session")).await.unwrap();
        assert_eq!(
            reopened.get(USER_ID_KEY).await.unwrap(),
            Some(serde_json::json!("abc"))
        );
        assert!(!dir.path().join("session").join(".loanApplicationUserId.json.tmp").exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn file_store_interleaves_writes_on_one_thread() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        let app_id = serde_json::json!("6f1c2d3e-0000-4000-8000-000000000001");
        let user_id = serde_json::json!("6f1c2d3e-0000-4000-8000-000000000002");
        let success = serde_json::json!(true);
        let (a, b, c) = tokio::join!(
            store.put(APPLICATION_ID_KEY, &app_id),
            store.put(USER_ID_KEY, &user_id),
            store.put(SUBMISSION_SUCCESS_KEY, &success),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();
        let snapshot = ClientSnapshot::load(&store).await.unwrap();
        assert!(snapshot.submission_succeeded);
        assert!(snapshot.application_id.is_some());
        assert!(snapshot.user_id.is_some());
    }

    #[tokio::test]
    async fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(FORM_DATA_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("loanApplicationId.json"), b"{not json").unwrap();
        assert!(matches!(
            store.get(APPLICATION_ID_KEY).await,
            Err(SnapshotError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn client_snapshot_roundtrip_through_keys() {
        let registry = StepRegistry::loan_application();
        let store = MemorySnapshotStore::new();
        let state = ApplicationFormState::new(&registry);
        let app_id = ApplicationId::new();

        save_form(&store, &state).await.unwrap();
        write_key(&store, APPLICATION_ID_KEY, &app_id).await.unwrap();
        write_key(&store, SUBMISSION_SUCCESS_KEY, &true).await.unwrap();

        let snap = ClientSnapshot::load(&store).await.unwrap();
        assert_eq!(snap.form, Some(state));
        assert_eq!(snap.application_id, Some(app_id));
        assert!(snap.submission_succeeded);
        assert!(snap.user_id.is_none());
        assert!(snap.saved_at.is_some());
    }

    #[tokio::test]
    async fn clear_all_blanks_the_snapshot() {
        let store = MemorySnapshotStore::new();
        write_key(&store, USER_ID_KEY, &UserId::new()).await.unwrap();
        write_key(&store, SUBMISSION_SUCCESS_KEY, &true).await.unwrap();
        clear_all(&store).await.unwrap();
        assert!(ClientSnapshot::load(&store).await.unwrap().is_blank());
        assert!(store.is_empty());
    }
}
