//! In-memory store with write counters, for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{Error, NoteStore, Result, TagStore};
use crate::{notes::Note, tags::Tag};

#[derive(Default)]
pub struct MemoryStore {
    pub notes: Mutex<Vec<Note>>,
    pub tags: Mutex<Vec<Tag>>,
    pub note_writes: AtomicUsize,
    pub tag_writes: AtomicUsize,
    pub note_reads: AtomicUsize,
    pub failing: AtomicBool,
    pub read_only: AtomicBool,
}

impl MemoryStore {
    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: Mutex::new(notes),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Reads keep working, every write fails.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn tag_writes(&self) -> usize {
        self.tag_writes.load(Ordering::SeqCst)
    }

    pub fn note_writes(&self) -> usize {
        self.note_writes.load(Ordering::SeqCst)
    }

    pub fn note_reads(&self) -> usize {
        self.note_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is failing".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.check()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.check()?;
        self.note_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.notes.lock().clone())
    }

    async fn upsert_note(&self, note: &Note) -> Result<()> {
        self.check_write()?;
        self.note_writes.fetch_add(1, Ordering::SeqCst);
        let mut notes = self.notes.lock();
        match notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => notes.push(note.clone()),
        }
        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.check_write()?;
        self.note_writes.fetch_add(1, Ordering::SeqCst);
        self.notes.lock().retain(|n| n.id != id);
        Ok(())
    }

    async fn get_published(&self, id: Uuid) -> Result<Option<Note>> {
        self.check()?;
        Ok(self.notes.lock().iter().find(|n| n.id == id && n.is_published).cloned())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.check()?;
        Ok(self.tags.lock().clone())
    }

    async fn replace_tags(&self, tags: &[Tag]) -> Result<()> {
        self.check_write()?;
        self.tag_writes.fetch_add(1, Ordering::SeqCst);
        *self.tags.lock() = tags.to_vec();
        Ok(())
    }
}
