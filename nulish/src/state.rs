use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::DB,
    events::Notifier,
    notes::{DraftSaver, NoteRepository, RepositoryOptions},
    store::{KvStore, RemoteStore, SqliteStore, Store},
    sync::SyncOrchestrator,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub repo: NoteRepository,
    pub drafts: DraftSaver,
    pub events: Notifier,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, events: Notifier, config: &Config) -> Self {
        let repo = NoteRepository::new(
            store,
            events.clone(),
            RepositoryOptions {
                cache_ttl: Duration::from_millis(config.cache_ttl_ms),
                fingerprint: config.tag_fingerprint,
            },
        );
        let drafts = DraftSaver::new(repo.clone(), Duration::from_millis(config.save_debounce_ms));

        Self { repo, drafts, events }
    }

    /// Picks the store from `config`: the relational store, or the local
    /// cache mirrored to a remote when `remote_url` is set.
    pub fn from_config(db: DB, config: &Config) -> Self {
        let events = Notifier::default();

        let store: Arc<dyn Store> = match &config.remote_url {
            Some(remote_url) => {
                tracing::info!(%remote_url, namespace = %config.cache_namespace, "local-first mode");
                Arc::new(SyncOrchestrator::new(
                    Arc::new(KvStore::new(db, &config.cache_namespace)),
                    Arc::new(RemoteStore::new(remote_url)),
                    events.clone(),
                ))
            }
            None => Arc::new(SqliteStore::new(db)),
        };

        Self::new(store, events, config)
    }
}
