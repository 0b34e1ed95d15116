use uuid::Uuid;

use crate::{ctx::BaseParams, Error, Result};

use super::{DraftAccepted, DraftSaver, FindNotesResponse, Note, SaveDraft, SaveNote, SearchNotes};

pub async fn find_notes(BaseParams { repo, .. }: BaseParams) -> Result<FindNotesResponse> {
    Ok(FindNotesResponse {
        results: repo.list().await?,
    })
}

pub async fn save_note(input: SaveNote, BaseParams { repo, .. }: BaseParams) -> Result<Note> {
    repo.save(input).await
}

pub async fn get_note(note_id: Uuid, BaseParams { repo, .. }: BaseParams) -> Result<Note> {
    repo.get(note_id).await
}

pub async fn put_note(note_id: Uuid, mut note: Note, BaseParams { repo, .. }: BaseParams) -> Result<Note> {
    note.id = note_id;
    repo.put(note).await
}

pub async fn delete_note(note_id: Option<Uuid>, BaseParams { repo, .. }: BaseParams) -> Result<Note> {
    let note_id = note_id.ok_or_else(|| Error::MissingParameter("id".into()))?;
    repo.delete(note_id).await
}

pub async fn search_notes(query: SearchNotes, BaseParams { repo, .. }: BaseParams) -> Result<FindNotesResponse> {
    Ok(FindNotesResponse {
        results: repo.search(&query).await?,
    })
}

pub async fn save_draft(
    note_id: Uuid,
    draft: SaveDraft,
    drafts: &DraftSaver,
    BaseParams { repo, .. }: BaseParams,
) -> Result<DraftAccepted> {
    // unknown ids would otherwise turn into a brand new note
    repo.get(note_id).await?;
    drafts.push(note_id, draft);
    Ok(DraftAccepted { id: note_id })
}

pub async fn get_published_note(note_id: Option<Uuid>, BaseParams { repo, .. }: BaseParams) -> Result<Note> {
    let note_id = note_id.ok_or_else(|| Error::MissingParameter("id".into()))?;
    repo.published(note_id).await
}
