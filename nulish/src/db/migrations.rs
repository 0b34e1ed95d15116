use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE notes (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),

                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]', -- JSON array of strings

                is_pinned INTEGER NOT NULL DEFAULT 0,
                is_published INTEGER NOT NULL DEFAULT 0,

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX notes_updated_at ON notes (updated_at);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE tags (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE,

                name TEXT NOT NULL,
                parent_id BLOB CHECK(length(parent_id) = 16),

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#
        ),
        M::up(
            r#"
            CREATE TABLE kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
        "#
        ),
    ]);
}
