//! Persistence seams for notes and tags.
//!
//! Everything above this module talks to [`NoteStore`] and [`TagStore`], so
//! the relational store, the local JSON cache, the HTTP remote and the sync
//! orchestrator are interchangeable.

pub mod kv;
pub mod remote;
pub mod sqlite;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{db, notes::Note, tags::Tag};

pub use kv::KvStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DB(#[from] db::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("remote responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<db::tokio_rusqlite::Error> for Error {
    fn from(error: db::tokio_rusqlite::Error) -> Self {
        Self::DB(error.into())
    }
}

impl From<db::rusqlite::Error> for Error {
    fn from(error: db::rusqlite::Error) -> Self {
        Self::DB(error.into())
    }
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<Note>>;

    /// Inserts or fully replaces the note with the same id.
    async fn upsert_note(&self, note: &Note) -> Result<()>;

    /// Deleting an unknown id is not an error.
    async fn delete_note(&self, id: Uuid) -> Result<()>;

    /// Only notes flagged as published are ever returned.
    async fn get_published(&self, id: Uuid) -> Result<Option<Note>>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Replaces the entire tag collection.
    async fn replace_tags(&self, tags: &[Tag]) -> Result<()>;
}

pub trait Store: NoteStore + TagStore {}

impl<T: NoteStore + TagStore> Store for T {}
