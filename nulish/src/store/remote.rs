//! HTTP client for another instance's `/api/v1` routes.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use uuid::Uuid;

use super::{Error, NoteStore, Result, TagStore};
use crate::{
    notes::{FindNotesResponse, Note},
    tags::{FindTagsResponse, ReplaceTags, Tag},
};

#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl NoteStore for RemoteStore {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let response = self.client.get(self.url("/notes")).send().await?;
        let found: FindNotesResponse = ensure_success(response).await?.json().await?;
        Ok(found.results)
    }

    async fn upsert_note(&self, note: &Note) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/notes/{}", note.id)))
            .json(note)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        let response = self.client.delete(self.url(&format!("/notes/{id}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn get_published(&self, id: Uuid) -> Result<Option<Note>> {
        let response = self
            .client
            .get(self.url("/public/notes"))
            .query(&[("id", id.to_string())])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }
}

#[async_trait]
impl TagStore for RemoteStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let response = self.client.get(self.url("/tags")).send().await?;
        let found: FindTagsResponse = ensure_success(response).await?.json().await?;
        Ok(found.results)
    }

    async fn replace_tags(&self, tags: &[Tag]) -> Result<()> {
        let response = self
            .client
            .put(self.url("/tags"))
            .json(&ReplaceTags { tags: tags.to_vec() })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
