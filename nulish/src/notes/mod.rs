mod drafts;
mod handlers;
mod model;
mod repository;
mod routes;
pub mod search;

pub use drafts::DraftSaver;
pub use model::*;
pub use repository::{NoteRepository, RepositoryOptions};

use crate::{openapi::aide::axum::ApiRouter, state::AppState};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new().merge(routes::router(state.clone()))
}
