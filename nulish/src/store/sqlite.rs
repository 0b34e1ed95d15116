use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{NoteStore, Result, TagStore};
use crate::{db::DB, notes::Note, tags::parser::parse_tag_list, tags::Tag};

const NOTE_COLUMNS: &str = "id, title, content, tags, is_pinned, is_published, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        let tags: Option<String> = row.get(3)?;

        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            tags: tags.as_deref().map(parse_tag_list).unwrap_or_default(),
            is_pinned: row.get(4)?,
            is_published: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl<'a> TryFrom<&Row<'a>> for Tag {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// Relational Note Store and Tag Store over SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: DB,
}

impl SqliteStore {
    pub fn new(db: DB) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NoteStore for SqliteStore {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let notes = self
            .db
            .call(|conn| {
                let notes = conn
                    .prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY updated_at DESC"))?
                    .query_map([], |row| Note::try_from(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(notes)
            })
            .await?;

        Ok(notes)
    }

    async fn upsert_note(&self, note: &Note) -> Result<()> {
        let note = note.clone();
        let tags = serde_json::to_string(&note.tags)?;

        self.db
            .call(move |conn| {
                conn.execute(
                    &format!(
                        r#"INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        ON CONFLICT(id) DO UPDATE SET
                            title = excluded.title,
                            content = excluded.content,
                            tags = excluded.tags,
                            is_pinned = excluded.is_pinned,
                            is_published = excluded.is_published,
                            created_at = excluded.created_at,
                            updated_at = excluded.updated_at"#
                    ),
                    params![
                        note.id,
                        note.title,
                        note.content,
                        tags,
                        note.is_pinned,
                        note.is_published,
                        note.created_at,
                        note.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM notes WHERE id = ?", params![id])?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn get_published(&self, id: Uuid) -> Result<Option<Note>> {
        let note = self
            .db
            .call(move |conn| {
                let note = conn
                    .query_row(
                        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND is_published = 1"),
                        params![id],
                        |row| Note::try_from(row),
                    )
                    .optional()?;
                Ok(note)
            })
            .await?;

        Ok(note)
    }
}

#[async_trait]
impl TagStore for SqliteStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = self
            .db
            .call(|conn| {
                let tags = conn
                    .prepare("SELECT id, name, parent_id, created_at FROM tags ORDER BY created_at ASC")?
                    .query_map([], |row| Tag::try_from(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;

        Ok(tags)
    }

    async fn replace_tags(&self, tags: &[Tag]) -> Result<()> {
        let tags = tags.to_vec();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM tags", [])?;
                {
                    let mut insert =
                        tx.prepare("INSERT INTO tags (id, name, parent_id, created_at) VALUES (?, ?, ?, ?)")?;
                    for tag in &tags {
                        insert.execute(params![tag.id, tag.name, tag.parent_id, tag.created_at])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}
