use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{
                routing::{get, post},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json, Query,
    },
    state::AppState,
};

use super::{handlers, ReplaceTags, SuggestTags};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/api/v1/tags", get(find_tags).put(replace_tags))
        .api_route("/api/v1/tags/tree", get(tag_tree))
        .api_route("/api/v1/tags/suggest", get(suggest_tags))
        .api_route("/api/v1/tags/rebuild", post(rebuild_tags))
        .with_state(state)
}

async fn find_tags(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::find_tags(base).await.map(Json)
}

async fn replace_tags(NoApi(base): NoApi<BaseParams>, Json(args): Json<ReplaceTags>) -> impl IntoApiResponse {
    handlers::replace_tags(args, base).await.map(Json)
}

async fn tag_tree(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::tag_tree(base).await.map(Json)
}

async fn suggest_tags(Query(query): Query<SuggestTags>, NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::suggest_tags(query, base).await.map(Json)
}

async fn rebuild_tags(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::rebuild_tags(base).await.map(Json)
}
