mod handlers;
mod model;
pub mod parser;
pub mod reconcile;
mod routes;
pub mod suggest;
pub mod tree;

pub use model::*;
pub use reconcile::{FingerprintMode, Reconciliation, TagReconciler};

use crate::{openapi::aide::axum::ApiRouter, state::AppState};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new().merge(routes::router(state))
}
