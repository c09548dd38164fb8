//! Local/remote dual-write with polling.
//!
//! Writes go to the remote first and are mirrored locally. When the remote is
//! unreachable the change is kept locally only. A poller re-fetches the remote
//! document and adopts it when it is strictly newer than what we hold, unless a
//! save of our own is in flight. There is no merging: the last writer wins.

use std::{
    future::Future,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::eyre::Context as _;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest interval `run` will poll at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDocument {
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn load(&self) -> color_eyre::Result<Option<SyncDocument>>;
    /// Stores `doc` and returns it as the backend recorded it. A backend that
    /// stamps `updated_at` itself returns its own timestamp.
    async fn save(&self, doc: &SyncDocument) -> color_eyre::Result<SyncDocument>;
}

/// A JSON file on disk, the local half of a [`SyncedStore`].
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn load(&self) -> color_eyre::Result<Option<SyncDocument>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let doc = serde_json::from_slice(&bytes)
            .wrap_err_with(|| format!("{} is not a sync document", self.path.display()))?;

        Ok(Some(doc))
    }

    async fn save(&self, doc: &SyncDocument) -> color_eyre::Result<SyncDocument> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err("Failed to create sync directory")?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)
            .await
            .wrap_err("Failed to write sync document")?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .wrap_err("Failed to move sync document into place")?;

        Ok(doc.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to reach the remote store: {0:?}")]
    Remote(color_eyre::Report),
    #[error("Failed to save locally: {0:?}")]
    Local(color_eyre::Report),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Synced,
    /// The remote write failed and only the local copy has the change.
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    Unchanged,
    /// Inactive or a save is in flight.
    Skipped,
}

pub struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncedStore<L, R> {
    local: L,
    remote: R,
    cached: RwLock<Option<SyncDocument>>,
    saving: AtomicBool,
    active: AtomicBool,
}

impl<L: Backend, R: Backend> SyncedStore<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            cached: RwLock::new(None),
            saving: AtomicBool::new(false),
            active: AtomicBool::new(true),
        }
    }

    /// Seeds the in-memory copy from the local backend.
    pub async fn load_local(&self) -> Result<Option<SyncDocument>, SyncError> {
        let doc = self.local.load().await.map_err(SyncError::Local)?;
        (*self.cached.write().await).clone_from(&doc);
        Ok(doc)
    }

    pub async fn current(&self) -> Option<SyncDocument> {
        self.cached.read().await.clone()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Marks a save as in flight until the guard is dropped.
    pub fn begin_save(&self) -> SavingGuard<'_> {
        self.saving.store(true, Ordering::SeqCst);
        SavingGuard(&self.saving)
    }

    #[tracing::instrument(skip_all)]
    pub async fn save(&self, payload: serde_json::Value) -> Result<SaveOutcome, SyncError> {
        let _guard = self.begin_save();

        let doc = SyncDocument {
            payload,
            updated_at: Utc::now(),
        };

        // Newer-than checks compare remote timestamps, so keep the one the remote stored
        let (outcome, stored) = match self.remote.save(&doc).await {
            Ok(stored) => {
                if let Err(e) = self.local.save(&stored).await {
                    tracing::warn!(error = ?e, "Failed to mirror sync document locally");
                }
                (SaveOutcome::Synced, stored)
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Remote save failed, keeping the change locally");
                let stored = self.local.save(&doc).await.map_err(SyncError::Local)?;
                (SaveOutcome::LocalOnly, stored)
            }
        };

        *self.cached.write().await = Some(stored);

        Ok(outcome)
    }

    #[tracing::instrument(skip_all)]
    pub async fn poll_once(&self) -> Result<PollOutcome, SyncError> {
        if !self.is_active() || self.is_saving() {
            return Ok(PollOutcome::Skipped);
        }

        let Some(remote) = self.remote.load().await.map_err(SyncError::Remote)? else {
            return Ok(PollOutcome::Unchanged);
        };

        let mut cached = self.cached.write().await;

        let newer = cached
            .as_ref()
            .map_or(true, |have| remote.updated_at > have.updated_at);
        if !newer {
            return Ok(PollOutcome::Unchanged);
        }

        // A save may have started while we were fetching
        if self.is_saving() {
            return Ok(PollOutcome::Skipped);
        }

        if let Err(e) = self.local.save(&remote).await {
            tracing::warn!(error = ?e, "Failed to store remote document locally");
        }
        tracing::debug!(updated_at = %remote.updated_at, "Applied newer remote document");
        *cached = Some(remote);

        Ok(PollOutcome::Applied)
    }

    /// Polls every `interval` until `shutdown` resolves. Intervals below
    /// [`MIN_POLL_INTERVAL`] are raised to it.
    pub async fn run(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(outcome) => tracing::trace!(?outcome, "Polled remote"),
                        Err(e) => tracing::warn!(error = %e, "Polling failed, will retry"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    };

    use color_eyre::eyre::eyre;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default, Clone)]
    struct Memory {
        doc: Arc<Mutex<Option<SyncDocument>>>,
        down: Arc<AtomicBool>,
        /// Stamp saves with our own clock, `skew_secs` away from the caller's.
        own_clock: Arc<AtomicBool>,
        skew_secs: Arc<AtomicI64>,
    }

    impl Memory {
        async fn put(&self, payload: serde_json::Value, updated_at: DateTime<Utc>) {
            *self.doc.lock().await = Some(SyncDocument {
                payload,
                updated_at,
            });
        }

        async fn get(&self) -> Option<SyncDocument> {
            self.doc.lock().await.clone()
        }

        fn now(&self) -> DateTime<Utc> {
            Utc::now() + chrono::Duration::seconds(self.skew_secs.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl Backend for Memory {
        async fn load(&self) -> color_eyre::Result<Option<SyncDocument>> {
            if self.down.load(Ordering::SeqCst) {
                return Err(eyre!("connection refused"));
            }
            Ok(self.doc.lock().await.clone())
        }

        async fn save(&self, doc: &SyncDocument) -> color_eyre::Result<SyncDocument> {
            if self.down.load(Ordering::SeqCst) {
                return Err(eyre!("connection refused"));
            }
            let updated_at = if self.own_clock.load(Ordering::SeqCst) {
                self.now()
            } else {
                doc.updated_at
            };
            let stored = SyncDocument {
                payload: doc.payload.clone(),
                updated_at,
            };
            *self.doc.lock().await = Some(stored.clone());
            Ok(stored)
        }
    }

    fn store() -> (SyncedStore<Memory, Memory>, Memory, Memory) {
        let (local, remote) = (Memory::default(), Memory::default());
        (
            SyncedStore::new(local.clone(), remote.clone()),
            local,
            remote,
        )
    }

    #[tokio::test]
    async fn saves_write_both_sides() {
        let (store, local, remote) = store();

        let outcome = store.save(json!({"week": "2025-12-08"})).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Synced);
        assert_eq!(local.get().await, remote.get().await);
        assert!(!store.is_saving());
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_local() {
        let (store, local, remote) = store();
        remote.down.store(true, Ordering::SeqCst);

        let outcome = store.save(json!({"n": 1})).await.unwrap();

        assert_eq!(outcome, SaveOutcome::LocalOnly);
        assert_eq!(local.get().await.unwrap().payload, json!({"n": 1}));
        assert!(remote.get().await.is_none());
        assert!(!store.is_saving());

        assert!(matches!(store.poll_once().await, Err(SyncError::Remote(_))));
    }

    #[tokio::test]
    async fn only_strictly_newer_remote_state_is_applied() {
        let (store, local, remote) = store();
        store.save(json!({"n": 1})).await.unwrap();
        let ours = store.current().await.unwrap();

        remote.put(json!({"n": 0}), ours.updated_at).await;
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Unchanged);

        remote
            .put(json!({"n": 0}), ours.updated_at - chrono::Duration::seconds(10))
            .await;
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Unchanged);
        assert_eq!(store.current().await.unwrap().payload, json!({"n": 1}));

        remote
            .put(json!({"n": 2}), ours.updated_at + chrono::Duration::seconds(10))
            .await;
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Applied);
        assert_eq!(store.current().await.unwrap().payload, json!({"n": 2}));
        assert_eq!(local.get().await.unwrap().payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn remote_timestamps_win_over_our_clock() {
        let (store, _local, remote) = store();
        remote.own_clock.store(true, Ordering::SeqCst);
        remote.skew_secs.store(-60, Ordering::SeqCst);

        store.save(json!({"n": 1})).await.unwrap();
        assert_eq!(
            store.current().await.unwrap().updated_at,
            remote.get().await.unwrap().updated_at
        );

        // Another device writes a little later by the remote's clock, still
        // well behind ours
        remote
            .put(json!({"n": 2}), remote.now() + chrono::Duration::seconds(1))
            .await;

        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Applied);
        assert_eq!(store.current().await.unwrap().payload, json!({"n": 2}));

        // A remote running ahead doesn't make our own write look new again
        remote.skew_secs.store(3600, Ordering::SeqCst);
        store.save(json!({"n": 3})).await.unwrap();
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Unchanged);
    }

    #[tokio::test]
    async fn zero_interval_still_polls() {
        let (store, _local, remote) = store();
        remote.put(json!({"n": 4}), Utc::now()).await;

        store
            .run(Duration::ZERO, tokio::time::sleep(Duration::from_millis(20)))
            .await;

        assert_eq!(store.current().await.unwrap().payload, json!({"n": 4}));
    }

    #[tokio::test]
    async fn polling_waits_for_saves_and_visibility() {
        let (store, _local, remote) = store();
        remote.put(json!({"n": 5}), Utc::now()).await;

        {
            let _saving = store.begin_save();
            assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Skipped);
        }

        store.set_active(false);
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Skipped);

        store.set_active(true);
        assert_eq!(store.poll_once().await.unwrap(), PollOutcome::Applied);
    }

    #[tokio::test]
    async fn run_polls_until_shutdown() {
        let (store, _local, remote) = store();
        remote.put(json!({"n": 9}), Utc::now()).await;

        store
            .run(
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;

        assert_eq!(store.current().await.unwrap().payload, json!({"n": 9}));
    }

    #[tokio::test]
    async fn file_backend_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested").join("plan.json"));

        assert!(backend.load().await.unwrap().is_none());

        let doc = SyncDocument {
            payload: json!({"recipes": ["Chili"]}),
            updated_at: Utc::now(),
        };
        backend.save(&doc).await.unwrap();

        assert_eq!(backend.load().await.unwrap(), Some(doc));

        tokio::fs::write(dir.path().join("nested").join("plan.json"), b"garbage")
            .await
            .unwrap();
        assert!(backend.load().await.is_err());
    }
}
