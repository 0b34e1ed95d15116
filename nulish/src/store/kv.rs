//! Local fallback cache: two JSON collections under namespaced keys.
//!
//! There is no schema version. Records are decoded one by one with field
//! defaults, and a record that still fails to decode is skipped.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{NoteStore, Result, TagStore};
use crate::{
    db::{tokio_rusqlite, DB},
    notes::Note,
    tags::Tag,
};

#[derive(Clone)]
pub struct KvStore {
    db: DB,
    notes_key: String,
    tags_key: String,
}

impl KvStore {
    pub fn new(db: DB, namespace: &str) -> Self {
        Self {
            db,
            notes_key: format!("{namespace}:notes"),
            tags_key: format!("{namespace}:tags"),
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let key = key.to_string();
        let raw = self
            .db
            .call(move |conn| Ok(read_raw(conn, &key)?))
            .await?;

        Ok(raw.map(|raw| decode_records(&raw)).unwrap_or_default())
    }

    /// Read, change and write back one collection in a single transaction.
    /// The connection runs one call at a time, so concurrent edits never
    /// start from the same snapshot. `edit` returns whether to write.
    async fn modify<T, F>(&self, key: &str, edit: F) -> Result<()>
    where
        T: DeserializeOwned + Serialize + Send + 'static,
        F: FnOnce(&mut Vec<T>) -> bool + Send + 'static,
    {
        let key = key.to_string();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;

                let mut records: Vec<T> = read_raw(&tx, &key)?
                    .map(|raw| decode_records(&raw))
                    .unwrap_or_default();

                if edit(&mut records) {
                    let value = serde_json::to_string(&records).map_err(|e| tokio_rusqlite::Error::Other(e.into()))?;
                    write_raw(&tx, &key, &value)?;
                }

                tx.commit()?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}

fn read_raw(conn: &rusqlite::Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| row.get::<_, String>(0))
        .optional()
}

fn write_raw(conn: &rusqlite::Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn decode_records<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    let items = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items,
        Err(error) => {
            tracing::warn!(%error, "cached collection is not a JSON array, ignoring");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, "skipping undecodable cached record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl NoteStore for KvStore {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.read(&self.notes_key).await
    }

    async fn upsert_note(&self, note: &Note) -> Result<()> {
        let note = note.clone();
        self.modify(&self.notes_key, move |notes: &mut Vec<Note>| {
            match notes.iter_mut().find(|n| n.id == note.id) {
                Some(existing) => *existing = note,
                None => notes.push(note),
            }
            true
        })
        .await
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.modify(&self.notes_key, move |notes: &mut Vec<Note>| {
            let before = notes.len();
            notes.retain(|n| n.id != id);
            notes.len() != before
        })
        .await
    }

    async fn get_published(&self, id: Uuid) -> Result<Option<Note>> {
        let notes: Vec<Note> = self.read(&self.notes_key).await?;
        Ok(notes.into_iter().find(|n| n.id == id && n.is_published))
    }
}

#[async_trait]
impl TagStore for KvStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.read(&self.tags_key).await
    }

    async fn replace_tags(&self, tags: &[Tag]) -> Result<()> {
        let tags = tags.to_vec();
        self.modify(&self.tags_key, move |current: &mut Vec<Tag>| {
            *current = tags;
            true
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::init_test_db;

    #[tokio::test]
    async fn test_collections_live_under_namespaced_keys() -> Result<()> {
        let db = init_test_db().await?;
        let store = KvStore::new(db.clone(), "nulish");

        let note = Note {
            title: "cached".into(),
            ..Note::new(Uuid::now_v7(), Utc::now())
        };
        store.upsert_note(&note).await?;
        store.replace_tags(&[]).await?;

        let keys = db
            .call(|conn| {
                let keys = conn
                    .prepare("SELECT key FROM kv ORDER BY key")?
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await?;
        assert_eq!(keys, vec!["nulish:notes", "nulish:tags"]);

        assert_eq!(store.list_notes().await?, vec![note.clone()]);
        assert!(store.get_published(note.id).await?.is_none());

        store.delete_note(note.id).await?;
        assert!(store.list_notes().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_defensive_read() -> Result<()> {
        let db = init_test_db().await?;
        db.call(|conn| {
            conn.execute_batch(
                r##"INSERT INTO kv (key, value) VALUES ('nulish:notes',
                    '[{"id": "018f6138-5b4f-722d-97c5-29b927cedbd4", "content": "#old", "tags": "oops"},
                      {"title": "no id"},
                      {"id": "018f6146-32f4-7f98-90b8-19fda2c87491", "title": "t", "tags": ["a"], "is_published": true}]');
                   INSERT INTO kv (key, value) VALUES ('nulish:tags', 'garbage');"##,
            )?;
            Ok(())
        })
        .await?;

        let store = KvStore::new(db, "nulish");
        let notes = store.list_notes().await?;

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].content, "#old");
        assert!(notes[0].tags.is_empty());
        assert!(!notes[0].is_pinned);
        assert_eq!(notes[1].tags, vec!["a"]);
        assert!(store.list_tags().await?.is_empty());

        let id = Uuid::parse_str("018f6146-32f4-7f98-90b8-19fda2c87491").unwrap();
        assert!(store.get_published(id).await?.is_some());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_keep_every_note() -> Result<()> {
        let store = KvStore::new(init_test_db().await?, "nulish");
        let doomed = Note::new(Uuid::now_v7(), Utc::now());
        store.upsert_note(&doomed).await?;
        let doomed_id = doomed.id;

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.spawn(async move {
                let note = Note {
                    title: format!("note {i}"),
                    ..Note::new(Uuid::now_v7(), Utc::now())
                };
                store.upsert_note(&note).await
            });
        }
        {
            let store = store.clone();
            tasks.spawn(async move { store.delete_note(doomed_id).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.expect("write task panicked")?;
        }

        let notes = store.list_notes().await?;
        assert_eq!(notes.len(), 20);
        assert!(notes.iter().all(|n| n.id != doomed_id));
        Ok(())
    }
}
