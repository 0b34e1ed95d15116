use crate::{ctx::BaseParams, Result};

use super::{FindTagsResponse, RebuildTagsResponse, ReplaceTags, SuggestTags, TagTreeResponse};

pub async fn find_tags(BaseParams { repo, .. }: BaseParams) -> Result<FindTagsResponse> {
    Ok(FindTagsResponse {
        results: repo.tags().await?,
    })
}

pub async fn replace_tags(input: ReplaceTags, BaseParams { repo, .. }: BaseParams) -> Result<FindTagsResponse> {
    Ok(FindTagsResponse {
        results: repo.replace_tags(input.tags).await?,
    })
}

pub async fn tag_tree(BaseParams { repo, .. }: BaseParams) -> Result<TagTreeResponse> {
    Ok(TagTreeResponse {
        results: repo.tag_tree().await?,
    })
}

pub async fn suggest_tags(query: SuggestTags, BaseParams { repo, .. }: BaseParams) -> Result<FindTagsResponse> {
    Ok(FindTagsResponse {
        results: repo.suggest_tags(query.q.as_deref().unwrap_or_default()).await?,
    })
}

pub async fn rebuild_tags(BaseParams { repo, .. }: BaseParams) -> Result<RebuildTagsResponse> {
    let outcome = repo.rebuild_tags().await?;
    let changed = outcome.changed();

    let mut results = outcome.into_tags();
    super::tree::sort_tags(&mut results);

    Ok(RebuildTagsResponse { changed, results })
}
