//! Local-first store: serves the local cache and mirrors it to a remote.
//!
//! Reads return the local copy right away and kick off a background refresh
//! from the remote. Writes land locally first and are pushed to the remote
//! in the background; a failing remote is logged, never returned.
//!
//! Local writes the remote has not acknowledged stay marked as unsynced. A
//! refresh pushes them again before it pulls, and a pull never deletes or
//! overwrites a record that is still unsynced.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::{
    events::{ChangeEvent, Notifier},
    notes::Note,
    store::{self, NoteStore, Store, TagStore},
    tags::Tag,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    /// The remote received this many local records.
    PushedLocal(usize),
    /// Local was overwritten with this many remote records.
    PulledRemote(usize),
    /// Another refresh of the same collection was already running.
    Skipped,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    local: Arc<dyn Store>,
    remote: Arc<dyn Store>,
    events: Notifier,
    tasks: TaskTracker,
    notes_refresh: Arc<AtomicBool>,
    tags_refresh: Arc<AtomicBool>,
    unsynced_notes: Mutex<Unsynced<Uuid>>,
    unsynced_tags: Mutex<Unsynced<()>>,
    /// Held by local writes and by a pull while it rewrites local.
    local_writes: tokio::sync::Mutex<()>,
}

/// Held while a refresh runs, releases the flag on drop.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keys written locally but not yet acknowledged by the remote.
///
/// Every write gets a new sequence number. An acknowledgement only clears
/// its key when no newer write to that key happened in between.
struct Unsynced<K> {
    seq: u64,
    keys: HashMap<K, u64>,
}

impl<K> Default for Unsynced<K> {
    fn default() -> Self {
        Self {
            seq: 0,
            keys: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Unsynced<K> {
    fn mark(&mut self, key: K) -> u64 {
        self.seq += 1;
        self.keys.insert(key, self.seq);
        self.seq
    }

    fn acknowledge(&mut self, key: K, seq: u64) {
        if self.keys.get(&key) == Some(&seq) {
            self.keys.remove(&key);
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }

    fn pending(&self) -> Vec<(K, u64)> {
        self.keys.iter().map(|(key, seq)| (*key, *seq)).collect()
    }
}

trait Record: Clone + PartialEq {
    fn id(&self) -> Uuid;
}

impl Record for Note {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Tag {
    fn id(&self) -> Uuid {
        self.id
    }
}

enum Plan<T> {
    Unchanged,
    Push(Vec<T>),
    Pull(Vec<T>),
}

fn plan<T: Record>(mut local: Vec<T>, mut remote: Vec<T>) -> Plan<T> {
    if remote.is_empty() {
        return if local.is_empty() {
            Plan::Unchanged
        } else {
            Plan::Push(local)
        };
    }

    local.sort_by_key(Record::id);
    remote.sort_by_key(Record::id);

    if local == remote {
        Plan::Unchanged
    } else {
        Plan::Pull(remote)
    }
}

fn without_unsynced<T: Record>(mut records: Vec<T>, unsynced: &Unsynced<Uuid>) -> Vec<T> {
    records.retain(|record| !unsynced.contains(&record.id()));
    records
}

impl SyncOrchestrator {
    pub fn new(local: Arc<dyn Store>, remote: Arc<dyn Store>, events: Notifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                events,
                tasks: TaskTracker::new(),
                notes_refresh: Arc::default(),
                tags_refresh: Arc::default(),
                unsynced_notes: Mutex::default(),
                unsynced_tags: Mutex::default(),
                local_writes: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Runs one notes refresh now, unless one is already in flight.
    pub async fn sync_notes(&self) -> store::Result<SyncOutcome> {
        match InFlight::acquire(&self.inner.notes_refresh) {
            Some(_guard) => self.refresh_notes().await,
            None => Ok(SyncOutcome::Skipped),
        }
    }

    /// Runs one tags refresh now, unless one is already in flight.
    pub async fn sync_tags(&self) -> store::Result<SyncOutcome> {
        match InFlight::acquire(&self.inner.tags_refresh) {
            Some(_guard) => self.refresh_tags().await,
            None => Ok(SyncOutcome::Skipped),
        }
    }

    /// Waits for every background refresh and mirror spawned so far.
    pub async fn flush(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Sends the current local state of every unsynced note to the remote.
    async fn push_unsynced_notes(&self) -> store::Result<usize> {
        let pending = self.inner.unsynced_notes.lock().pending();
        if pending.is_empty() {
            return Ok(0);
        }

        let notes = self.inner.local.list_notes().await?;
        for (id, seq) in &pending {
            match notes.iter().find(|note| note.id == *id) {
                Some(note) => self.inner.remote.upsert_note(note).await?,
                None => self.inner.remote.delete_note(*id).await?,
            }
            self.inner.unsynced_notes.lock().acknowledge(*id, *seq);
        }

        tracing::info!(count = pending.len(), "unsynced notes pushed");
        Ok(pending.len())
    }

    async fn push_unsynced_tags(&self) -> store::Result<usize> {
        let pending = self.inner.unsynced_tags.lock().pending();
        let Some(&((), seq)) = pending.first() else {
            return Ok(0);
        };

        let tags = self.inner.local.list_tags().await?;
        self.inner.remote.replace_tags(&tags).await?;
        self.inner.unsynced_tags.lock().acknowledge((), seq);

        tracing::info!(count = tags.len(), "unsynced tags pushed");
        Ok(tags.len())
    }

    async fn refresh_notes(&self) -> store::Result<SyncOutcome> {
        let Inner { local, remote, .. } = self.inner.as_ref();

        let pushed = self.push_unsynced_notes().await?;
        let remote_notes = remote.list_notes().await?;

        let writing = self.inner.local_writes.lock().await;
        let local_notes = local.list_notes().await?;
        let (local_notes, remote_notes) = {
            let unsynced = self.inner.unsynced_notes.lock();
            (
                without_unsynced(local_notes, &unsynced),
                without_unsynced(remote_notes, &unsynced),
            )
        };

        let outcome = match plan(local_notes.clone(), remote_notes) {
            Plan::Unchanged if pushed > 0 => SyncOutcome::PushedLocal(pushed),
            Plan::Unchanged => SyncOutcome::Unchanged,
            Plan::Push(notes) => {
                drop(writing);
                for note in &notes {
                    remote.upsert_note(note).await?;
                }
                SyncOutcome::PushedLocal(pushed + notes.len())
            }
            Plan::Pull(notes) => {
                for stale in local_notes.iter().filter(|l| !notes.iter().any(|r| r.id == l.id)) {
                    local.delete_note(stale.id).await?;
                }
                for note in &notes {
                    local.upsert_note(note).await?;
                }
                drop(writing);
                self.inner.events.notify(ChangeEvent::NotesChanged);
                SyncOutcome::PulledRemote(notes.len())
            }
        };

        tracing::debug!(?outcome, "notes synced");
        Ok(outcome)
    }

    async fn refresh_tags(&self) -> store::Result<SyncOutcome> {
        let Inner { local, remote, .. } = self.inner.as_ref();

        let pushed = self.push_unsynced_tags().await?;
        let remote_tags = remote.list_tags().await?;

        let writing = self.inner.local_writes.lock().await;
        if self.inner.unsynced_tags.lock().contains(&()) {
            // written again since the push, the next refresh sends it
            return Ok(SyncOutcome::Unchanged);
        }
        let local_tags = local.list_tags().await?;

        let outcome = match plan(local_tags, remote_tags) {
            Plan::Unchanged if pushed > 0 => SyncOutcome::PushedLocal(pushed),
            Plan::Unchanged => SyncOutcome::Unchanged,
            Plan::Push(tags) => {
                drop(writing);
                remote.replace_tags(&tags).await?;
                SyncOutcome::PushedLocal(tags.len())
            }
            Plan::Pull(tags) => {
                local.replace_tags(&tags).await?;
                drop(writing);
                self.inner.events.notify(ChangeEvent::TagsChanged);
                SyncOutcome::PulledRemote(tags.len())
            }
        };

        tracing::debug!(?outcome, "tags synced");
        Ok(outcome)
    }

    fn spawn_notes_refresh(&self) {
        let Some(guard) = InFlight::acquire(&self.inner.notes_refresh) else {
            return;
        };
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            let _guard = guard;
            if let Err(error) = this.refresh_notes().await {
                tracing::warn!(%error, "background notes refresh failed");
            }
        });
    }

    fn spawn_tags_refresh(&self) {
        let Some(guard) = InFlight::acquire(&self.inner.tags_refresh) else {
            return;
        };
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            let _guard = guard;
            if let Err(error) = this.refresh_tags().await {
                tracing::warn!(%error, "background tags refresh failed");
            }
        });
    }

    /// Runs `write` against the remote in the background. `acknowledge`
    /// only runs when the remote accepted the write.
    fn mirror<F, Fut, A>(&self, what: &'static str, write: F, acknowledge: A)
    where
        F: FnOnce(Arc<dyn Store>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = store::Result<()>> + Send + 'static,
        A: FnOnce(&Inner) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            match write(inner.remote.clone()).await {
                Ok(()) => {
                    acknowledge(&inner);
                    tracing::debug!(what, "mirrored to remote");
                }
                Err(error) => tracing::warn!(%error, what, "remote mirror failed, kept for the next refresh"),
            }
        });
    }
}

#[async_trait]
impl NoteStore for SyncOrchestrator {
    async fn list_notes(&self) -> store::Result<Vec<Note>> {
        let notes = match self.inner.local.list_notes().await {
            Ok(notes) => notes,
            Err(error) => {
                tracing::error!(%error, "local notes unreadable");
                Vec::new()
            }
        };
        self.spawn_notes_refresh();
        Ok(notes)
    }

    async fn upsert_note(&self, note: &Note) -> store::Result<()> {
        let seq = {
            let _writing = self.inner.local_writes.lock().await;
            let seq = self.inner.unsynced_notes.lock().mark(note.id);
            self.inner.local.upsert_note(note).await?;
            seq
        };

        let note = note.clone();
        let id = note.id;
        self.mirror(
            "upsert_note",
            move |remote| async move { remote.upsert_note(&note).await },
            move |inner| inner.unsynced_notes.lock().acknowledge(id, seq),
        );
        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> store::Result<()> {
        let seq = {
            let _writing = self.inner.local_writes.lock().await;
            let seq = self.inner.unsynced_notes.lock().mark(id);
            self.inner.local.delete_note(id).await?;
            seq
        };

        self.mirror(
            "delete_note",
            move |remote| async move { remote.delete_note(id).await },
            move |inner| inner.unsynced_notes.lock().acknowledge(id, seq),
        );
        Ok(())
    }

    async fn get_published(&self, id: Uuid) -> store::Result<Option<Note>> {
        self.inner.local.get_published(id).await
    }
}

#[async_trait]
impl TagStore for SyncOrchestrator {
    async fn list_tags(&self) -> store::Result<Vec<Tag>> {
        let tags = match self.inner.local.list_tags().await {
            Ok(tags) => tags,
            Err(error) => {
                tracing::error!(%error, "local tags unreadable");
                Vec::new()
            }
        };
        self.spawn_tags_refresh();
        Ok(tags)
    }

    async fn replace_tags(&self, tags: &[Tag]) -> store::Result<()> {
        let seq = {
            let _writing = self.inner.local_writes.lock().await;
            let seq = self.inner.unsynced_tags.lock().mark(());
            self.inner.local.replace_tags(tags).await?;
            seq
        };

        let tags = tags.to_vec();
        self.mirror(
            "replace_tags",
            move |remote| async move { remote.replace_tags(&tags).await },
            move |inner| inner.unsynced_tags.lock().acknowledge((), seq),
        );
        Ok(())
    }
}
