use crate::{
    ctx::BaseParams,
    notes::DraftSaver,
    openapi::{
        aide::{
            axum::{
                routing::{get, post_with},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json, Path, Query,
    },
    state::AppState,
};
use axum::{extract::State, http::StatusCode};

use schemars::JsonSchema;

use serde::Deserialize;
use uuid::Uuid;

use super::{handlers, DraftAccepted, Note, NoteIdQuery, SaveDraft, SaveNote, SearchNotes};

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/v1/notes",
            get(find_notes).post(save_note).delete(delete_note_by_query),
        )
        .api_route(
            "/api/v1/notes/{note_id}",
            get(get_note).put(put_note).delete(delete_note),
        )
        .api_route(
            "/api/v1/notes/{note_id}/draft",
            post_with(save_draft, |t| t.response::<202, Json<DraftAccepted>>()),
        )
        .api_route("/api/v1/search", get(search_notes))
        .api_route("/api/v1/public/notes", get(get_published_note))
        .with_state(state)
}

async fn find_notes(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::find_notes(base).await.map(Json)
}

async fn save_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<SaveNote>) -> impl IntoApiResponse {
    handlers::save_note(args, base).await.map(Json)
}

async fn get_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_note(note_id, base).await.map(Json)
}

async fn put_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(note): Json<Note>,
) -> impl IntoApiResponse {
    handlers::put_note(note_id, note, base).await.map(Json)
}

async fn delete_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::delete_note(Some(note_id), base).await.map(Json)
}

async fn delete_note_by_query(
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::delete_note(id, base).await.map(Json)
}

async fn save_draft(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    State(drafts): State<DraftSaver>,
    NoApi(base): NoApi<BaseParams>,
    Json(draft): Json<SaveDraft>,
) -> impl IntoApiResponse {
    handlers::save_draft(note_id, draft, &drafts, base)
        .await
        .map(|r| (StatusCode::ACCEPTED, Json(r)))
}

async fn search_notes(Query(query): Query<SearchNotes>, NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::search_notes(query, base).await.map(Json)
}

async fn get_published_note(
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_published_note(id, base).await.map(Json)
}
